//! Result lifecycle scenarios: start, pass, fail, skip, monotonicity, and
//! file attachment through the active-result handle.

use slick_report::config::{MapConfigurationSource, keys};
use slick_report::lifecycle::{ResultTracker, SkipPolicy, TestFailure};
use slick_report::meta::{TestDescription, TestMetadata};
use slick_report::model::{ResultStatus, RunStatus};
use slick_report::session::SessionController;
use slick_report::testing::{MockClientFactory, MockSlickClient};
use std::io::Write;
use std::sync::Arc;

fn enabled_controller(client: Arc<MockSlickClient>) -> Arc<SessionController> {
    slick_report::testing::init_test_logging();
    let config = MapConfigurationSource::new()
        .set(keys::BASE_URL, "http://slick.example.com")
        .set(keys::PROJECT_NAME, "Web Store");
    Arc::new(SessionController::new(
        Arc::new(config),
        Arc::new(MockClientFactory::for_client(client)),
    ))
}

fn disabled_controller(client: Arc<MockSlickClient>) -> Arc<SessionController> {
    Arc::new(SessionController::new(
        Arc::new(MapConfigurationSource::new()),
        Arc::new(MockClientFactory::for_client(client)),
    ))
}

fn cart_test() -> TestDescription {
    TestDescription::new("checkout::cart", "add_item")
        .with_metadata(TestMetadata::new("Add item to cart").component("Checkout"))
}

#[test]
fn starting_marks_the_result_running() {
    let client = MockSlickClient::new();
    let tracker = ResultTracker::new(enabled_controller(Arc::clone(&client)));
    let test = cart_test();

    let active = tracker.starting(&test);
    assert!(active.is_bound());

    let stored = client.result_by_id(active.result_id().unwrap()).unwrap();
    assert_eq!(stored.runstatus, Some(RunStatus::Running));
    assert_eq!(stored.reason.as_deref(), Some(""));
    assert!(stored.started.is_some());
}

#[test]
fn tests_without_metadata_are_never_reported() {
    let client = MockSlickClient::new();
    let controller = enabled_controller(Arc::clone(&client));
    let tracker = ResultTracker::new(Arc::clone(&controller));
    // Session init happens up front; everything after must stay quiet.
    assert!(controller.is_enabled());
    let init_calls = client.total_calls();

    let test = TestDescription::new("checkout::cart", "unreported");
    let active = tracker.starting(&test);
    assert!(!active.is_bound());
    tracker.succeeded(&test);
    tracker.failed(&test, &TestFailure::new("boom", "trace"));
    tracker.skipped(&test, "not applicable");

    assert_eq!(client.total_calls(), init_calls);
    assert!(client.results().is_empty());
}

#[test]
fn disabled_session_makes_every_transition_a_no_op() {
    let client = MockSlickClient::new();
    let tracker = ResultTracker::new(disabled_controller(Arc::clone(&client)));
    let test = cart_test();

    let active = tracker.starting(&test);
    assert!(!active.is_bound());
    tracker.succeeded(&test);
    assert_eq!(client.total_calls(), 0);
}

#[test]
fn success_finishes_the_result_as_pass() {
    let client = MockSlickClient::new();
    let tracker = ResultTracker::new(enabled_controller(Arc::clone(&client)));
    let test = cart_test();

    let active = tracker.starting(&test);
    tracker.succeeded(&test);

    let stored = client.result_by_id(active.result_id().unwrap()).unwrap();
    assert_eq!(stored.status, Some(ResultStatus::Pass));
    assert_eq!(stored.runstatus, Some(RunStatus::Finished));
    assert!(stored.finished.is_some());
}

#[test]
fn failure_records_message_and_stack_trace_in_the_reason() {
    let client = MockSlickClient::new();
    let tracker = ResultTracker::new(enabled_controller(Arc::clone(&client)));
    let test = cart_test();

    let active = tracker.starting(&test);
    let failure = TestFailure::new(
        "expected 2 items, found 1",
        "at checkout::cart::add_item (cart.rs:42)\nat test harness (runner.rs:7)",
    );
    tracker.failed(&test, &failure);

    let stored = client.result_by_id(active.result_id().unwrap()).unwrap();
    assert_eq!(stored.status, Some(ResultStatus::Fail));
    assert_eq!(stored.runstatus, Some(RunStatus::Finished));
    let reason = stored.reason.unwrap();
    assert!(reason.starts_with("expected 2 items, found 1\n"));
    assert!(reason.contains("cart.rs:42"));
}

#[test]
fn default_skip_policy_marks_results_skipped() {
    let client = MockSlickClient::new();
    let tracker = ResultTracker::new(enabled_controller(Arc::clone(&client)));
    let test = cart_test();

    let active = tracker.starting(&test);
    tracker.skipped(&test, "requires staging credentials");

    let stored = client.result_by_id(active.result_id().unwrap()).unwrap();
    assert_eq!(stored.status, Some(ResultStatus::Skipped));
    assert_eq!(stored.runstatus, Some(RunStatus::Finished));
    assert_eq!(stored.reason.as_deref(), Some("requires staging credentials"));
}

#[test]
fn mark_failed_skip_policy_records_fail_with_skipped_runstatus() {
    let client = MockSlickClient::new();
    let tracker = ResultTracker::with_skip_policy(
        enabled_controller(Arc::clone(&client)),
        SkipPolicy::MarkFailed,
    );
    let test = cart_test();

    let active = tracker.starting(&test);
    tracker.skipped(&test, "requires staging credentials");

    let stored = client.result_by_id(active.result_id().unwrap()).unwrap();
    assert_eq!(stored.status, Some(ResultStatus::Fail));
    assert_eq!(stored.runstatus, Some(RunStatus::Skipped));
}

#[test]
fn finished_results_accept_no_further_transitions() {
    let client = MockSlickClient::new();
    let tracker = ResultTracker::new(enabled_controller(Arc::clone(&client)));
    let test = cart_test();

    let active = tracker.starting(&test);
    tracker.succeeded(&test);
    let updates_after_pass = client.call_count("update-result");

    tracker.failed(&test, &TestFailure::new("late failure", "trace"));
    tracker.skipped(&test, "too late");
    let ignored = tracker.starting(&test);
    assert!(!ignored.is_bound());

    let stored = client.result_by_id(active.result_id().unwrap()).unwrap();
    assert_eq!(stored.status, Some(ResultStatus::Pass));
    assert_eq!(client.call_count("update-result"), updates_after_pass);
}

#[test]
fn update_failure_during_transition_is_swallowed() {
    let client = MockSlickClient::new();
    let tracker = ResultTracker::new(enabled_controller(Arc::clone(&client)));
    let test = cart_test();

    let active = tracker.starting(&test);
    client.fail_on("update-result");
    tracker.succeeded(&test);
    client.clear_failure("update-result");

    // The transition was attempted and swallowed; the result is still the
    // one the test started with.
    let stored = client.result_by_id(active.result_id().unwrap()).unwrap();
    assert_eq!(stored.runstatus, Some(RunStatus::Running));
}

#[test]
fn attach_file_uploads_and_links_the_stored_file() {
    let client = MockSlickClient::new();
    let tracker = ResultTracker::new(enabled_controller(Arc::clone(&client)));
    let test = cart_test();

    let active = tracker.starting(&test);

    let mut file = tempfile::Builder::new()
        .prefix("cart-dump")
        .suffix(".log")
        .tempfile()
        .unwrap();
    writeln!(file, "cart contents: []").unwrap();
    active.attach_file(file.path());

    let uploads = client.uploaded_files();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].file_name.ends_with(".log"));
    assert_eq!(uploads[0].mimetype, "text/plain");

    let stored = client.result_by_id(active.result_id().unwrap()).unwrap();
    assert_eq!(stored.files.len(), 1);
    assert_eq!(stored.files[0].id, uploads[0].id);
}

#[test]
fn attachments_on_an_inert_handle_are_dropped() {
    let client = MockSlickClient::new();
    let tracker = ResultTracker::new(disabled_controller(Arc::clone(&client)));
    let active = tracker.starting(&cart_test());

    active.attach_file_data("shot.png", "image/png", &[1, 2, 3]);
    assert_eq!(client.call_count("upload-file"), 0);
}

#[test]
fn upload_failure_leaves_the_result_unchanged() {
    let client = MockSlickClient::new();
    let tracker = ResultTracker::new(enabled_controller(Arc::clone(&client)));
    let test = cart_test();

    let active = tracker.starting(&test);
    client.fail_on("upload-file");
    active.attach_file_data("shot.png", "image/png", &[1, 2, 3]);

    let stored = client.result_by_id(active.result_id().unwrap()).unwrap();
    assert!(stored.files.is_empty());
}

#[test]
fn concurrent_tests_track_their_own_results() {
    let client = MockSlickClient::new();
    let controller = enabled_controller(Arc::clone(&client));
    assert!(controller.is_enabled());
    let tracker = Arc::new(ResultTracker::new(controller));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || {
                let test = TestDescription::new("checkout::parallel", format!("case_{worker}"))
                    .with_metadata(TestMetadata::new(format!("Parallel case {worker}")));
                let active = tracker.starting(&test);
                assert!(active.is_bound());
                if worker % 2 == 0 {
                    tracker.succeeded(&test);
                } else {
                    tracker.failed(&test, &TestFailure::new("boom", "trace"));
                }
                active.result_id().unwrap().to_string()
            })
        })
        .collect();

    let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let unique: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), 4, "each test must correlate to its own result");
    assert_eq!(client.results().len(), 4);
}
