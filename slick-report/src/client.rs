//! Remote client contract for the slick service.
//!
//! The wire-level transport is out of scope for this crate: implementations
//! live with the embedder (an HTTP client in production, the in-memory
//! [`MockSlickClient`](crate::testing::MockSlickClient) in tests). Calls
//! block the calling thread for their full duration; timeouts and retries,
//! if any, belong to the implementation.

use crate::error::SlickError;
use crate::model::{
    Component, LogEntry, Project, ResultUpdate, StoredFile, TestCase, TestPlan, TestResult,
    TestRun,
};
use std::sync::Arc;

/// Abstract operations against the slick service.
///
/// Lookup operations return [`SlickError::NotFound`] when nothing matches;
/// the session layer uses that as the create branch of find-or-create.
pub trait SlickClient: Send + Sync {
    /// Fetch a project by its natural key, the name.
    fn project_by_name(&self, name: &str) -> Result<Project, SlickError>;

    /// Create a project. The returned record carries the assigned id.
    fn create_project(&self, project: &Project) -> Result<Project, SlickError>;

    /// Fetch a project by id, used to refresh the cached component list.
    fn project(&self, id: &str) -> Result<Project, SlickError>;

    /// List test plans matching (project id, name). May be empty.
    fn find_test_plans(&self, project_id: &str, name: &str) -> Result<Vec<TestPlan>, SlickError>;

    /// Create a test plan.
    fn create_test_plan(&self, plan: &TestPlan) -> Result<TestPlan, SlickError>;

    /// Create a test run.
    fn create_test_run(&self, run: &TestRun) -> Result<TestRun, SlickError>;

    /// List test cases matching (project id, automation id). May be empty.
    fn find_test_cases(
        &self,
        project_id: &str,
        automation_id: &str,
    ) -> Result<Vec<TestCase>, SlickError>;

    /// Create a test case.
    fn create_test_case(&self, case: &TestCase) -> Result<TestCase, SlickError>;

    /// Update a test case in place, keyed by its id.
    fn update_test_case(&self, case: &TestCase) -> Result<TestCase, SlickError>;

    /// Create a component on a project.
    fn create_component(
        &self,
        project_id: &str,
        component: &Component,
    ) -> Result<Component, SlickError>;

    /// Update a component of a project, keyed by the component id.
    fn update_component(
        &self,
        project_id: &str,
        component: &Component,
    ) -> Result<Component, SlickError>;

    /// Create a result record.
    fn create_result(&self, result: &TestResult) -> Result<TestResult, SlickError>;

    /// Fetch a result record by id.
    fn result(&self, id: &str) -> Result<TestResult, SlickError>;

    /// Apply a sparse update to a result record.
    fn update_result(&self, id: &str, update: &ResultUpdate) -> Result<TestResult, SlickError>;

    /// Append a batch of log entries to a result.
    fn add_result_logs(&self, result_id: &str, entries: &[LogEntry]) -> Result<(), SlickError>;

    /// Upload a file, returning the stored-file record to attach.
    fn upload_file(
        &self,
        file_name: &str,
        mimetype: &str,
        data: &[u8],
    ) -> Result<StoredFile, SlickError>;
}

/// Builds a client for a normalized base url.
///
/// The session controller owns configuration and url normalization; the
/// factory owns the transport. This replaces a process-wide singleton with
/// explicit construction at suite startup.
pub trait SlickClientFactory: Send + Sync {
    fn connect(&self, base_url: &str) -> Result<Arc<dyn SlickClient>, SlickError>;
}

/// Normalize a configured base url so it ends with `api/`.
///
/// Users configure the url they would visit with a browser; the API lives
/// under the `api/` path below it.
pub fn normalize_base_url(raw: &str) -> String {
    if raw.ends_with("api") {
        format!("{raw}/")
    } else if raw.ends_with("api/") {
        raw.to_string()
    } else if raw.ends_with('/') {
        format!("{raw}api/")
    } else {
        format!("{raw}/api/")
    }
}
