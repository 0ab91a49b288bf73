//! In-memory mock of the slick service for tests.
//!
//! [`MockSlickClient`] implements [`SlickClient`] against an in-memory
//! entity store, records every operation it serves, and supports per
//! operation failure injection. It does not open network sockets; it is
//! intended for unit and E2E tests where a real slick server is
//! unavailable.

use crate::client::{SlickClient, SlickClientFactory};
use crate::error::SlickError;
use crate::model::{
    Component, LogEntry, Project, ResultUpdate, StoredFile, TestCase, TestPlan, TestResult,
    TestRun,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once};
use uuid::Uuid;

static INIT_LOGGING: Once = Once::new();

/// Initialize tracing output for tests, honoring `RUST_LOG`. Safe to call
/// multiple times.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug, Default)]
struct MockState {
    projects: Vec<Project>,
    test_plans: Vec<TestPlan>,
    test_runs: Vec<TestRun>,
    test_cases: Vec<TestCase>,
    results: HashMap<String, TestResult>,
    logs: HashMap<String, Vec<LogEntry>>,
    files: Vec<StoredFile>,
}

/// Mock slick service backed by in-memory state.
pub struct MockSlickClient {
    state: Mutex<MockState>,
    failing: Mutex<HashSet<&'static str>>,
    calls: Mutex<Vec<String>>,
}

impl MockSlickClient {
    pub fn new() -> Arc<Self> {
        Self::builder().build()
    }

    pub fn builder() -> MockSlickClientBuilder {
        MockSlickClientBuilder::default()
    }

    /// Inject a failure for one operation. Every subsequent call to that
    /// operation returns an error until [`clear_failure`](Self::clear_failure).
    pub fn fail_on(&self, operation: &'static str) {
        self.lock(&self.failing).insert(operation);
    }

    /// Stop failing an operation.
    pub fn clear_failure(&self, operation: &'static str) {
        self.lock(&self.failing).remove(operation);
    }

    /// Every operation served so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock(&self.calls).clone()
    }

    /// How many times one operation was served.
    pub fn call_count(&self, operation: &str) -> usize {
        self.lock(&self.calls)
            .iter()
            .filter(|c| c == &operation)
            .count()
    }

    /// Total number of remote calls served.
    pub fn total_calls(&self) -> usize {
        self.lock(&self.calls).len()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.lock(&self.state).projects.clone()
    }

    pub fn test_plans(&self) -> Vec<TestPlan> {
        self.lock(&self.state).test_plans.clone()
    }

    pub fn test_runs(&self) -> Vec<TestRun> {
        self.lock(&self.state).test_runs.clone()
    }

    pub fn test_cases(&self) -> Vec<TestCase> {
        self.lock(&self.state).test_cases.clone()
    }

    pub fn results(&self) -> Vec<TestResult> {
        self.lock(&self.state).results.values().cloned().collect()
    }

    pub fn result_by_id(&self, id: &str) -> Option<TestResult> {
        self.lock(&self.state).results.get(id).cloned()
    }

    /// Log batches posted for a result, flattened in arrival order.
    pub fn logs_for(&self, result_id: &str) -> Vec<LogEntry> {
        self.lock(&self.state)
            .logs
            .get(result_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn uploaded_files(&self) -> Vec<StoredFile> {
        self.lock(&self.state).files.clone()
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record(&self, operation: &'static str) -> Result<(), SlickError> {
        self.lock(&self.calls).push(operation.to_string());
        if self.lock(&self.failing).contains(operation) {
            return Err(SlickError::rejected(operation, "injected failure"));
        }
        Ok(())
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl SlickClient for MockSlickClient {
    fn project_by_name(&self, name: &str) -> Result<Project, SlickError> {
        self.record("get-project-by-name")?;
        self.lock(&self.state)
            .projects
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| SlickError::not_found("project", name))
    }

    fn create_project(&self, project: &Project) -> Result<Project, SlickError> {
        self.record("create-project")?;
        let mut created = project.clone();
        created.id = Some(new_id());
        self.lock(&self.state).projects.push(created.clone());
        Ok(created)
    }

    fn project(&self, id: &str) -> Result<Project, SlickError> {
        self.record("get-project")?;
        self.lock(&self.state)
            .projects
            .iter()
            .find(|p| p.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| SlickError::not_found("project", id))
    }

    fn find_test_plans(&self, project_id: &str, name: &str) -> Result<Vec<TestPlan>, SlickError> {
        self.record("find-testplans")?;
        Ok(self
            .lock(&self.state)
            .test_plans
            .iter()
            .filter(|plan| {
                plan.name == name
                    && plan
                        .project
                        .as_ref()
                        .and_then(|p| p.id.as_deref())
                        .is_some_and(|id| id == project_id)
            })
            .cloned()
            .collect())
    }

    fn create_test_plan(&self, plan: &TestPlan) -> Result<TestPlan, SlickError> {
        self.record("create-testplan")?;
        let mut created = plan.clone();
        created.id = Some(new_id());
        self.lock(&self.state).test_plans.push(created.clone());
        Ok(created)
    }

    fn create_test_run(&self, run: &TestRun) -> Result<TestRun, SlickError> {
        self.record("create-testrun")?;
        let mut created = run.clone();
        created.id = Some(new_id());
        self.lock(&self.state).test_runs.push(created.clone());
        Ok(created)
    }

    fn find_test_cases(
        &self,
        project_id: &str,
        automation_id: &str,
    ) -> Result<Vec<TestCase>, SlickError> {
        self.record("find-testcases")?;
        Ok(self
            .lock(&self.state)
            .test_cases
            .iter()
            .filter(|case| {
                case.automation_id.as_deref() == Some(automation_id)
                    && case
                        .project
                        .as_ref()
                        .and_then(|p| p.id.as_deref())
                        .is_some_and(|id| id == project_id)
            })
            .cloned()
            .collect())
    }

    fn create_test_case(&self, case: &TestCase) -> Result<TestCase, SlickError> {
        self.record("create-testcase")?;
        let mut created = case.clone();
        created.id = Some(new_id());
        self.lock(&self.state).test_cases.push(created.clone());
        Ok(created)
    }

    fn update_test_case(&self, case: &TestCase) -> Result<TestCase, SlickError> {
        self.record("update-testcase")?;
        let mut state = self.lock(&self.state);
        let stored = state
            .test_cases
            .iter_mut()
            .find(|c| c.id.is_some() && c.id == case.id)
            .ok_or_else(|| SlickError::not_found("testcase", case.name.clone()))?;
        *stored = case.clone();
        Ok(stored.clone())
    }

    fn create_component(
        &self,
        project_id: &str,
        component: &Component,
    ) -> Result<Component, SlickError> {
        self.record("create-component")?;
        let mut state = self.lock(&self.state);
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id.as_deref() == Some(project_id))
            .ok_or_else(|| SlickError::not_found("project", project_id))?;
        let mut created = component.clone();
        created.id = Some(new_id());
        if created.code.is_none() {
            created.code = Some(created.name.to_lowercase().replace(' ', "-"));
        }
        project.components.push(created.clone());
        Ok(created)
    }

    fn update_component(
        &self,
        project_id: &str,
        component: &Component,
    ) -> Result<Component, SlickError> {
        self.record("update-component")?;
        let mut state = self.lock(&self.state);
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id.as_deref() == Some(project_id))
            .ok_or_else(|| SlickError::not_found("project", project_id))?;
        let stored = project
            .components
            .iter_mut()
            .find(|c| c.id.is_some() && c.id == component.id)
            .ok_or_else(|| SlickError::not_found("component", component.name.clone()))?;
        let mut updated = component.clone();
        // The server assigns ids to newly appended features.
        for feature in &mut updated.features {
            if feature.id.is_none() {
                feature.id = Some(new_id());
            }
        }
        *stored = updated.clone();
        Ok(updated)
    }

    fn create_result(&self, result: &TestResult) -> Result<TestResult, SlickError> {
        self.record("create-result")?;
        let mut created = result.clone();
        let id = new_id();
        created.id = Some(id.clone());
        self.lock(&self.state).results.insert(id, created.clone());
        Ok(created)
    }

    fn result(&self, id: &str) -> Result<TestResult, SlickError> {
        self.record("get-result")?;
        self.lock(&self.state)
            .results
            .get(id)
            .cloned()
            .ok_or_else(|| SlickError::not_found("result", id))
    }

    fn update_result(&self, id: &str, update: &ResultUpdate) -> Result<TestResult, SlickError> {
        self.record("update-result")?;
        let mut state = self.lock(&self.state);
        let stored = state
            .results
            .get_mut(id)
            .ok_or_else(|| SlickError::not_found("result", id))?;
        if let Some(status) = update.status {
            stored.status = Some(status);
        }
        if let Some(runstatus) = update.runstatus {
            stored.runstatus = Some(runstatus);
        }
        if let Some(reason) = &update.reason {
            stored.reason = Some(reason.clone());
        }
        if let Some(started) = update.started {
            stored.started = Some(started);
        }
        if let Some(finished) = update.finished {
            stored.finished = Some(finished);
        }
        if let Some(files) = &update.files {
            stored.files = files.clone();
        }
        Ok(stored.clone())
    }

    fn add_result_logs(&self, result_id: &str, entries: &[LogEntry]) -> Result<(), SlickError> {
        self.record("add-result-logs")?;
        let mut state = self.lock(&self.state);
        if !state.results.contains_key(result_id) {
            return Err(SlickError::not_found("result", result_id));
        }
        state
            .logs
            .entry(result_id.to_string())
            .or_default()
            .extend_from_slice(entries);
        Ok(())
    }

    fn upload_file(
        &self,
        file_name: &str,
        mimetype: &str,
        _data: &[u8],
    ) -> Result<StoredFile, SlickError> {
        self.record("upload-file")?;
        let stored = StoredFile {
            id: Some(new_id()),
            file_name: file_name.to_string(),
            mimetype: mimetype.to_string(),
        };
        self.lock(&self.state).files.push(stored.clone());
        Ok(stored)
    }
}

/// Builder for [`MockSlickClient`], allowing entities to be seeded and
/// failures to be armed before the session touches the mock.
#[derive(Default)]
pub struct MockSlickClientBuilder {
    state: MockState,
    failing: HashSet<&'static str>,
}

impl MockSlickClientBuilder {
    /// Seed a pre-existing project. The caller supplies ids.
    pub fn project(mut self, project: Project) -> Self {
        self.state.projects.push(project);
        self
    }

    /// Seed a pre-existing test plan.
    pub fn test_plan(mut self, plan: TestPlan) -> Self {
        self.state.test_plans.push(plan);
        self
    }

    /// Seed a pre-existing test case.
    pub fn test_case(mut self, case: TestCase) -> Self {
        self.state.test_cases.push(case);
        self
    }

    /// Arm a failure for one operation.
    pub fn fail_on(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    pub fn build(self) -> Arc<MockSlickClient> {
        Arc::new(MockSlickClient {
            state: Mutex::new(self.state),
            failing: Mutex::new(self.failing),
            calls: Mutex::new(Vec::new()),
        })
    }
}

/// Factory handing out one shared [`MockSlickClient`], recording the base
/// urls it was asked to connect to.
pub struct MockClientFactory {
    client: Arc<MockSlickClient>,
    connected: Mutex<Vec<String>>,
    fail_connect: AtomicBool,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::for_client(MockSlickClient::new())
    }

    pub fn for_client(client: Arc<MockSlickClient>) -> Self {
        Self {
            client,
            connected: Mutex::new(Vec::new()),
            fail_connect: AtomicBool::new(false),
        }
    }

    /// The shared mock client, for assertions.
    pub fn client(&self) -> Arc<MockSlickClient> {
        Arc::clone(&self.client)
    }

    /// Base urls passed to [`connect`](SlickClientFactory::connect), in order.
    pub fn connected_urls(&self) -> Vec<String> {
        self.connected
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Make every subsequent connection attempt fail.
    pub fn refuse_connections(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }
}

impl Default for MockClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SlickClientFactory for MockClientFactory {
    fn connect(&self, base_url: &str) -> Result<Arc<dyn SlickClient>, SlickError> {
        self.connected
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(base_url.to_string());
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(SlickError::unavailable(format!(
                "mock refused connection to {base_url}"
            )));
        }
        Ok(Arc::clone(&self.client) as Arc<dyn SlickClient>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Feature, ProjectReference};

    #[test]
    fn find_or_create_roundtrip() {
        let client = MockSlickClient::new();
        assert!(client.project_by_name("Checkout").is_err());
        let created = client
            .create_project(&Project {
                name: "Checkout".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(created.id.is_some());
        let found = client.project_by_name("Checkout").unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(client.call_count("create-project"), 1);
    }

    #[test]
    fn injected_failures_are_scoped_to_one_operation() {
        let client = MockSlickClient::builder().fail_on("create-testrun").build();
        let err = client.create_test_run(&TestRun::default()).unwrap_err();
        assert!(err.to_string().contains("injected failure"));
        client.clear_failure("create-testrun");
        assert!(client.create_test_run(&TestRun::default()).is_ok());
    }

    #[test]
    fn update_component_assigns_feature_ids() {
        let client = MockSlickClient::new();
        let project = client
            .create_project(&Project {
                name: "Store".to_string(),
                ..Default::default()
            })
            .unwrap();
        let project_id = project.id.clone().unwrap();
        let mut component = client
            .create_component(
                &project_id,
                &Component {
                    name: "Checkout".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        component.features.push(Feature {
            id: None,
            name: "Cart".to_string(),
        });
        let updated = client.update_component(&project_id, &component).unwrap();
        assert!(updated.features[0].id.is_some());
        let refreshed = client.project(&project_id).unwrap();
        assert_eq!(refreshed.components[0].features.len(), 1);
    }

    #[test]
    fn seeded_test_plans_are_found_by_project_and_name() {
        let client = MockSlickClient::builder()
            .project(Project {
                id: Some("p1".to_string()),
                name: "Store".to_string(),
                ..Default::default()
            })
            .test_plan(TestPlan {
                id: Some("tp1".to_string()),
                name: "Nightly".to_string(),
                project: Some(ProjectReference {
                    id: Some("p1".to_string()),
                    name: "Store".to_string(),
                }),
            })
            .build();
        let plans = client.find_test_plans("p1", "Nightly").unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].id.as_deref(), Some("tp1"));
        assert!(client.find_test_plans("p1", "Weekly").unwrap().is_empty());
    }
}
