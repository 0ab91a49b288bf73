//! End-to-end session initialization scenarios against the mock service.

use slick_report::config::{MapConfigurationSource, keys};
use slick_report::model::{Project, ProjectReference, TestPlan};
use slick_report::session::SessionController;
use slick_report::client::SlickClientFactory;
use slick_report::testing::{MockClientFactory, MockSlickClient};
use std::sync::Arc;

fn base_config() -> MapConfigurationSource {
    MapConfigurationSource::new()
        .set(keys::BASE_URL, "http://slick.example.com")
        .set(keys::PROJECT_NAME, "Web Store")
}

fn controller_with(
    config: MapConfigurationSource,
    client: Arc<MockSlickClient>,
) -> Arc<SessionController> {
    slick_report::testing::init_test_logging();
    Arc::new(SessionController::new(
        Arc::new(config),
        Arc::new(MockClientFactory::for_client(client)),
    ))
}

#[test]
fn missing_base_url_disables_reporting_without_remote_calls() {
    let client = MockSlickClient::new();
    let config = MapConfigurationSource::new().set(keys::PROJECT_NAME, "Web Store");
    let controller = controller_with(config, Arc::clone(&client));

    assert!(!controller.is_enabled());
    assert!(controller.test_run().is_none());
    assert!(controller.client().is_none());
    assert_eq!(client.total_calls(), 0);
}

#[test]
fn missing_project_disables_reporting_without_remote_calls() {
    let client = MockSlickClient::new();
    let config = MapConfigurationSource::new().set(keys::BASE_URL, "http://slick.example.com");
    let controller = controller_with(config, Arc::clone(&client));

    assert!(!controller.is_enabled());
    assert_eq!(client.total_calls(), 0);
}

#[test]
fn minimal_config_creates_project_and_timestamp_named_testrun() {
    let client = MockSlickClient::new();
    let controller = controller_with(base_config(), Arc::clone(&client));

    assert!(controller.is_enabled());
    assert_eq!(client.call_count("create-project"), 1);
    assert_eq!(client.call_count("create-testrun"), 1);

    let run = controller.test_run().unwrap();
    assert!(run.testplan_id.is_none());
    let name = run.name.unwrap();
    assert!(
        name.starts_with("Tests run "),
        "expected timestamp-derived name, got '{name}'"
    );
    assert_eq!(run.project.unwrap().name, "Web Store");
}

#[test]
fn existing_project_is_reused_not_recreated() {
    let client = MockSlickClient::builder()
        .project(Project {
            id: Some("p1".to_string()),
            name: "Web Store".to_string(),
            ..Default::default()
        })
        .build();
    let controller = controller_with(base_config(), Arc::clone(&client));

    assert!(controller.is_enabled());
    assert_eq!(client.call_count("create-project"), 0);
    let run = controller.test_run().unwrap();
    assert_eq!(run.project.unwrap().id.as_deref(), Some("p1"));
}

#[test]
fn base_url_is_normalized_before_connecting() {
    let factory = Arc::new(MockClientFactory::new());
    let controller = SessionController::new(
        Arc::new(base_config()),
        Arc::clone(&factory) as Arc<dyn SlickClientFactory>,
    );
    assert!(controller.is_enabled());
    assert_eq!(
        factory.connected_urls(),
        vec!["http://slick.example.com/api/".to_string()]
    );
}

#[test]
fn configured_testplan_is_reused_and_names_the_testrun() {
    let client = MockSlickClient::builder()
        .project(Project {
            id: Some("p1".to_string()),
            name: "Web Store".to_string(),
            ..Default::default()
        })
        .test_plan(TestPlan {
            id: Some("tp1".to_string()),
            name: "Nightly".to_string(),
            project: Some(ProjectReference {
                id: Some("p1".to_string()),
                name: "Web Store".to_string(),
            }),
        })
        .build();
    let config = base_config().set(keys::TESTPLAN_NAME, "Nightly");
    let controller = controller_with(config, Arc::clone(&client));

    let run = controller.test_run().unwrap();
    assert_eq!(run.testplan_id.as_deref(), Some("tp1"));
    assert_eq!(run.name.as_deref(), Some("Nightly"));
    assert_eq!(client.call_count("create-testplan"), 0);
}

#[test]
fn unknown_testplan_is_created() {
    let client = MockSlickClient::new();
    let config = base_config().set(keys::TESTPLAN_NAME, "Nightly");
    let controller = controller_with(config, Arc::clone(&client));

    assert!(controller.is_enabled());
    assert_eq!(client.call_count("create-testplan"), 1);
    let run = controller.test_run().unwrap();
    assert!(run.testplan_id.is_some());
    assert_eq!(run.name.as_deref(), Some("Nightly"));
}

#[test]
fn explicit_testrun_name_wins_over_testplan_name() {
    let client = MockSlickClient::new();
    let config = base_config()
        .set(keys::TESTPLAN_NAME, "Nightly")
        .set(keys::TESTRUN_NAME, "Release candidate 3");
    let controller = controller_with(config, Arc::clone(&client));

    let run = controller.test_run().unwrap();
    assert_eq!(run.name.as_deref(), Some("Release candidate 3"));
}

#[test]
fn release_and_build_names_become_references() {
    let client = MockSlickClient::new();
    let config = base_config()
        .set(keys::RELEASE_NAME, "5.0")
        .set(keys::BUILD_NAME, "5.0.123");
    let controller = controller_with(config, Arc::clone(&client));

    let run = controller.test_run().unwrap();
    assert_eq!(run.release.unwrap().name, "5.0");
    assert_eq!(run.build.unwrap().name, "5.0.123");
}

#[test]
fn remote_failure_during_init_disables_the_session_terminally() {
    let client = MockSlickClient::builder().fail_on("create-testrun").build();
    let controller = controller_with(base_config(), Arc::clone(&client));

    assert!(!controller.is_enabled());
    // Clearing the failure afterwards changes nothing: disabled is
    // terminal for the controller's lifetime.
    client.clear_failure("create-testrun");
    assert!(!controller.is_enabled());
    assert_eq!(client.call_count("create-testrun"), 1);
}

#[test]
fn refused_connection_disables_the_session() {
    let factory = Arc::new(MockClientFactory::new());
    factory.refuse_connections();
    let client = factory.client();
    let controller = SessionController::new(
        Arc::new(base_config()),
        Arc::clone(&factory) as Arc<dyn SlickClientFactory>,
    );

    assert!(!controller.is_enabled());
    assert_eq!(client.total_calls(), 0);
}

#[test]
fn concurrent_first_use_initializes_exactly_once() {
    let client = MockSlickClient::new();
    let controller = controller_with(base_config(), Arc::clone(&client));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let controller = Arc::clone(&controller);
            std::thread::spawn(move || controller.is_enabled())
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(client.call_count("create-testrun"), 1);
    assert_eq!(client.call_count("create-project"), 1);
}
