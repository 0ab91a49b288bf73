//! Session controller: one instance per process, one test run per session.
//!
//! The controller is constructed once at suite startup with its
//! collaborators (configuration source and client factory) and threaded
//! through to every test invocation. On first use it resolves or creates
//! the project, optionally a test plan, and a fresh test run. If the base
//! url or project name is not configured, or any remote call during that
//! sequence fails, the session is disabled for the life of the process and
//! every operation degrades to a silent no-op: reporting problems must
//! never fail a test run.
//!
//! The controller also owns the test-identity to result registry and the
//! idempotent find-or-create reconciliation of component, feature, and
//! test case entities.

use crate::client::{SlickClient, SlickClientFactory, normalize_base_url};
use crate::config::{ConfigurationSource, keys};
use crate::error::SlickError;
use crate::meta::{TestDescription, TestMetadata, non_empty};
use crate::model::{
    BuildReference, Component, ComponentReference, Feature, FeatureReference, Project,
    ProjectReference, ReleaseReference, ResultStatus, Step, TestCase, TestCaseReference, TestPlan,
    TestResult, TestRun, TestRunReference,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock};
use tracing::{debug, error, warn};

/// Automation tool name stamped on every reconciled test case.
pub const AUTOMATION_TOOL: &str = "slick-report";

/// Reason carried by freshly created results.
const NOT_RUN_REASON: &str = "not run yet...";

/// Controls one reporting session and the registry of its results.
pub struct SessionController {
    config: Arc<dyn ConfigurationSource>,
    factory: Arc<dyn SlickClientFactory>,
    session: OnceLock<Option<Session>>,
}

/// Live state of an enabled session.
struct Session {
    client: Arc<dyn SlickClient>,
    project_id: String,
    /// Cached project, refreshed after component and feature writes so the
    /// component list reflects the remote state.
    project: RwLock<Project>,
    test_run: TestRun,
    /// Automation id to result registry. Append-only within a session.
    results: Mutex<HashMap<String, TestResult>>,
}

impl Session {
    fn project_ref(&self) -> ProjectReference {
        let project = self.project.read().unwrap_or_else(|p| p.into_inner());
        ProjectReference::from(&*project)
    }

    fn lock_results(&self) -> MutexGuard<'_, HashMap<String, TestResult>> {
        self.results.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl SessionController {
    /// Build a controller from its collaborators. No remote call happens
    /// until the first operation that needs the session.
    pub fn new(config: Arc<dyn ConfigurationSource>, factory: Arc<dyn SlickClientFactory>) -> Self {
        Self {
            config,
            factory,
            session: OnceLock::new(),
        }
    }

    /// Initialize-once gate. Concurrent first use is synchronized by the
    /// `OnceLock`, so exactly one test run is ever created per process.
    fn session(&self) -> Option<&Session> {
        self.session.get_or_init(|| self.initialize()).as_ref()
    }

    fn initialize(&self) -> Option<Session> {
        let Some(base_url) = self.config.entry(keys::BASE_URL) else {
            debug!(key = keys::BASE_URL, "slick reporting disabled: no base url configured");
            return None;
        };
        let Some(project_name) = self.config.entry(keys::PROJECT_NAME) else {
            debug!(key = keys::PROJECT_NAME, "slick reporting disabled: no project configured");
            return None;
        };
        match self.open_session(&base_url, &project_name) {
            Ok(session) => Some(session),
            Err(err) => {
                error!(
                    error = %err,
                    "error initializing slick; no report will happen for this process"
                );
                None
            }
        }
    }

    fn open_session(&self, base_url: &str, project_name: &str) -> Result<Session, SlickError> {
        let client = self.factory.connect(&normalize_base_url(base_url))?;

        let project = match client.project_by_name(project_name) {
            Ok(project) => project,
            Err(err) => {
                debug!(error = %err, project = project_name, "project lookup failed; creating it");
                client.create_project(&Project {
                    name: project_name.to_string(),
                    ..Default::default()
                })?
            }
        };
        let project_id = project.id.clone().ok_or_else(|| {
            SlickError::rejected("get-project", "server returned a project without an id")
        })?;
        let project_ref = ProjectReference::from(&project);

        // Release and build references are built purely from configured
        // names; the server resolves them.
        let release = self
            .config
            .entry(keys::RELEASE_NAME)
            .map(|name| ReleaseReference { id: None, name });
        let build = self
            .config
            .entry(keys::BUILD_NAME)
            .map(|name| BuildReference { id: None, name });

        let mut run_name = self.config.entry(keys::TESTRUN_NAME);
        let mut testplan_id = None;
        if let Some(plan_name) = self.config.entry(keys::TESTPLAN_NAME) {
            let plan =
                self.resolve_test_plan(client.as_ref(), &project_id, &project_ref, &plan_name)?;
            testplan_id = plan.id.clone();
            if run_name.is_none() {
                run_name = Some(plan.name.clone());
            }
        }

        let test_run = client.create_test_run(&TestRun {
            name: Some(run_name.unwrap_or_else(default_test_run_name)),
            project: Some(project_ref),
            testplan_id,
            release,
            build,
            ..Default::default()
        })?;

        Ok(Session {
            client,
            project_id,
            project: RwLock::new(project),
            test_run,
            results: Mutex::new(HashMap::new()),
        })
    }

    /// Reuse the first test plan matching (project, name), creating one
    /// only when the query comes back empty. Query failures are tolerated
    /// and fall through to the create branch.
    fn resolve_test_plan(
        &self,
        client: &dyn SlickClient,
        project_id: &str,
        project_ref: &ProjectReference,
        name: &str,
    ) -> Result<TestPlan, SlickError> {
        let found = match client.find_test_plans(project_id, name) {
            Ok(plans) => plans,
            Err(err) => {
                warn!(error = %err, testplan = name, "test plan lookup failed; creating a new one");
                Vec::new()
            }
        };
        match found.into_iter().next() {
            Some(plan) => Ok(plan),
            None => client.create_test_plan(&TestPlan {
                name: name.to_string(),
                project: Some(project_ref.clone()),
                ..Default::default()
            }),
        }
    }

    /// Whether this session is reporting to slick at all. Triggers
    /// initialization on first call.
    pub fn is_enabled(&self) -> bool {
        self.session().is_some()
    }

    /// The test run this session reports into, if enabled.
    pub fn test_run(&self) -> Option<TestRun> {
        self.session().map(|s| s.test_run.clone())
    }

    /// The remote client, if the session is enabled.
    pub fn client(&self) -> Option<Arc<dyn SlickClient>> {
        self.session().map(|s| Arc::clone(&s.client))
    }

    /// Derive the stable correlation key for a test: an explicit
    /// automation id from metadata when present, otherwise
    /// `<class_name>:<method_name>` so re-runs of the same test correlate
    /// to the same test case.
    pub fn automation_id_for(&self, description: &TestDescription) -> String {
        if let Some(meta) = &description.metadata
            && let Some(id) = non_empty(meta.automation_id.as_ref())
        {
            return id.to_string();
        }
        format!("{}:{}", description.class_name, description.method_name)
    }

    /// Look up the registered result for a test. Never creates one.
    pub fn result_for(&self, description: &TestDescription) -> Option<TestResult> {
        let session = self.session()?;
        let automation_id = self.automation_id_for(description);
        session.lock_results().get(&automation_id).cloned()
    }

    /// Return the cached result for a test, creating and registering one
    /// on first sight. Returns `None` when the session is disabled, the
    /// test has no metadata, or the remote create fails (which is logged,
    /// never raised).
    pub fn get_or_create_result(&self, description: &TestDescription) -> Option<TestResult> {
        let session = self.session()?;
        description.metadata.as_ref()?;
        let automation_id = self.automation_id_for(description);
        if let Some(existing) = session.lock_results().get(&automation_id).cloned() {
            return Some(existing);
        }
        match self.register_result(session, description, &automation_id) {
            Ok(result) => Some(result),
            Err(err) => {
                error!(
                    test = %description.display_name(),
                    error = %err,
                    "error creating slick result"
                );
                None
            }
        }
    }

    /// Explicit best-effort registration for advanced callers. This is the
    /// one entry point that reports remote failures back to the caller.
    /// No-op when the session is disabled, the test has no metadata, or a
    /// result is already registered.
    pub fn add_result_for(&self, description: &TestDescription) -> Result<(), SlickError> {
        let Some(session) = self.session() else {
            return Ok(());
        };
        if description.metadata.is_none() {
            return Ok(());
        }
        let automation_id = self.automation_id_for(description);
        if session.lock_results().contains_key(&automation_id) {
            return Ok(());
        }
        self.register_result(session, description, &automation_id)
            .map(|_| ())
    }

    /// Pre-register results for an expanded suite, continuing past
    /// individual failures.
    pub fn pre_register(&self, descriptions: &[TestDescription]) {
        if self.session().is_none() {
            return;
        }
        for description in descriptions {
            if description.metadata.is_none() {
                continue;
            }
            if let Err(err) = self.add_result_for(description) {
                error!(
                    test = %description.display_name(),
                    error = %err,
                    "error pre-registering suite result"
                );
            }
        }
    }

    fn register_result(
        &self,
        session: &Session,
        description: &TestDescription,
        automation_id: &str,
    ) -> Result<TestResult, SlickError> {
        let meta = description.metadata.as_ref().ok_or_else(|| {
            SlickError::rejected("create-result", "test has no reporting metadata")
        })?;
        let case = self.reconcile_test_case(session, meta, automation_id)?;

        let created = session.client.create_result(&TestResult {
            project: Some(session.project_ref()),
            testrun: Some(TestRunReference::from(&session.test_run)),
            testcase: Some(TestCaseReference::from(&case)),
            status: Some(ResultStatus::NoResult),
            reason: Some(NOT_RUN_REASON.to_string()),
            recorded: Some(Utc::now()),
            ..Default::default()
        })?;

        // Append-only registry: the first registration wins.
        let mut results = session.lock_results();
        Ok(results
            .entry(automation_id.to_string())
            .or_insert(created)
            .clone())
    }

    /// Find-or-create the test case for (project, automation id), then
    /// unconditionally push the current metadata back onto the record so
    /// the remote copy is kept in sync every run.
    fn reconcile_test_case(
        &self,
        session: &Session,
        meta: &TestMetadata,
        automation_id: &str,
    ) -> Result<TestCase, SlickError> {
        let client = session.client.as_ref();
        let found = match client.find_test_cases(&session.project_id, automation_id) {
            Ok(cases) => cases,
            Err(err) => {
                warn!(error = %err, automation_id, "test case lookup failed; creating a new one");
                Vec::new()
            }
        };
        let mut case = match found.into_iter().next() {
            Some(case) => case,
            None => client.create_test_case(&TestCase {
                name: meta.title.clone(),
                project: Some(session.project_ref()),
                ..Default::default()
            })?,
        };

        case.name = meta.title.clone();
        case.project = Some(session.project_ref());
        case.automated = true;
        case.automation_id = Some(automation_id.to_string());
        case.automation_key = non_empty(meta.automation_key.as_ref()).map(str::to_string);
        case.automation_tool = Some(AUTOMATION_TOOL.to_string());

        let component =
            non_empty(meta.component.as_ref()).and_then(|name| self.reconcile_component(session, name));
        case.component = component.as_ref().map(ComponentReference::from);
        case.feature = match (&component, non_empty(meta.feature.as_ref())) {
            (Some(component), Some(name)) => self.reconcile_feature(session, component, name),
            _ => None,
        };
        case.steps = meta.steps.iter().map(Step::from).collect();

        client.update_test_case(&case)
    }

    /// Resolve a component by exact name against the cached project,
    /// creating it remotely when absent. A create failure drops the
    /// component reference; the test case is still reported.
    fn reconcile_component(&self, session: &Session, name: &str) -> Option<Component> {
        {
            let project = session.project.read().unwrap_or_else(|p| p.into_inner());
            if let Some(existing) = project.components.iter().find(|c| c.name == name) {
                return Some(existing.clone());
            }
        }
        let component = Component {
            name: name.to_string(),
            ..Default::default()
        };
        match session.client.create_component(&session.project_id, &component) {
            Ok(created) => {
                self.refresh_project(session);
                Some(created)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    component = name,
                    "component create failed; reporting test case without a component"
                );
                None
            }
        }
    }

    /// Resolve a feature by exact name within a resolved component,
    /// appending it and updating the component when absent. A failure
    /// drops the feature reference only.
    fn reconcile_feature(
        &self,
        session: &Session,
        component: &Component,
        name: &str,
    ) -> Option<FeatureReference> {
        if let Some(existing) = component.features.iter().find(|f| f.name == name) {
            return Some(FeatureReference::from(existing));
        }
        let mut updated = component.clone();
        updated.features.push(Feature {
            id: None,
            name: name.to_string(),
        });
        match session.client.update_component(&session.project_id, &updated) {
            Ok(after) => {
                self.refresh_project(session);
                after
                    .features
                    .iter()
                    .find(|f| f.name == name)
                    .map(FeatureReference::from)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    feature = name,
                    "feature update failed; reporting test case without a feature"
                );
                None
            }
        }
    }

    fn refresh_project(&self, session: &Session) {
        match session.client.project(&session.project_id) {
            Ok(project) => {
                let mut cached = session.project.write().unwrap_or_else(|p| p.into_inner());
                *cached = project;
            }
            Err(err) => warn!(error = %err, "unable to refresh cached project"),
        }
    }
}

fn default_test_run_name() -> String {
    format!("Tests run {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfigurationSource;
    use crate::meta::TestMetadata;
    use crate::testing::MockClientFactory;

    fn controller_without_config() -> SessionController {
        SessionController::new(
            Arc::new(MapConfigurationSource::new()),
            Arc::new(MockClientFactory::new()),
        )
    }

    #[test]
    fn automation_id_prefers_explicit_metadata() {
        let controller = controller_without_config();
        let description = TestDescription::new("cart::tests", "add_item")
            .with_metadata(TestMetadata::new("Add item").automation_id("cart-add-1"));
        assert_eq!(controller.automation_id_for(&description), "cart-add-1");
    }

    #[test]
    fn automation_id_derives_from_test_identity() {
        let controller = controller_without_config();
        let description =
            TestDescription::new("cart::tests", "add_item").with_metadata(TestMetadata::new("Add item"));
        assert_eq!(
            controller.automation_id_for(&description),
            "cart::tests:add_item"
        );
    }

    #[test]
    fn empty_automation_id_falls_back_to_derivation() {
        let controller = controller_without_config();
        let description = TestDescription::new("cart::tests", "add_item")
            .with_metadata(TestMetadata::new("Add item").automation_id(""));
        assert_eq!(
            controller.automation_id_for(&description),
            "cart::tests:add_item"
        );
    }

    #[test]
    fn default_run_name_is_timestamp_derived() {
        let name = default_test_run_name();
        assert!(name.starts_with("Tests run "));
        assert!(name.ends_with("UTC"));
    }
}
