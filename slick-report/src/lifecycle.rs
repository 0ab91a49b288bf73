//! Result lifecycle tracking for executing tests.
//!
//! A [`ResultTracker`] observes start/success/failure/skip events from the
//! framework adapter and drives each registered result through
//! `NO_RESULT -> RUNNING -> {PASS, FAIL, SKIPPED}`. Transitions are
//! monotonic: once a result is terminal, later events for the same test are
//! ignored for the rest of the session.
//!
//! [`starting`](ResultTracker::starting) hands back an [`ActiveResult`],
//! the explicit per-test context for ad-hoc logging and file attachment
//! from inside the test body. Each worker thread or task owns its handle;
//! there is no ambient global slot.
//!
//! Every remote failure in this module is logged through the operator
//! error channel and swallowed. The test outcome as seen by the execution
//! framework is never altered by a reporting failure.

use crate::error::SlickError;
use crate::meta::TestDescription;
use crate::model::{LogEntry, ResultStatus, ResultUpdate, RunStatus};
use crate::session::SessionController;
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

/// How a skipped test is recorded.
///
/// Slick deployments disagree on the convention, so both are supported;
/// [`SkipPolicy::MarkSkipped`] is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// Record status=SKIPPED, runstatus=FINISHED.
    #[default]
    MarkSkipped,
    /// Record status=FAIL, runstatus=SKIPPED.
    MarkFailed,
}

/// Failure detail relayed from the execution framework.
#[derive(Debug, Clone)]
pub struct TestFailure {
    /// The failure message, e.g. the assertion or panic text.
    pub message: String,
    /// Full stack or backtrace text.
    pub trace: String,
}

impl TestFailure {
    pub fn new(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: trace.into(),
        }
    }

    /// The reason string recorded on a failed result: the message followed
    /// by the full trace text.
    pub fn reason_text(&self) -> String {
        format!("{}\n{}", self.message, self.trace)
    }
}

/// Drives results through their lifecycle in response to framework events.
pub struct ResultTracker {
    session: Arc<SessionController>,
    skip_policy: SkipPolicy,
    /// Automation ids whose results have reached a terminal state.
    finished: Mutex<HashSet<String>>,
}

impl ResultTracker {
    pub fn new(session: Arc<SessionController>) -> Self {
        Self::with_skip_policy(session, SkipPolicy::default())
    }

    pub fn with_skip_policy(session: Arc<SessionController>, skip_policy: SkipPolicy) -> Self {
        Self {
            session,
            skip_policy,
            finished: Mutex::new(HashSet::new()),
        }
    }

    /// The session this tracker reports through.
    pub fn session(&self) -> Arc<SessionController> {
        Arc::clone(&self.session)
    }

    /// A test is starting: obtain or create its result, mark it RUNNING
    /// with a start time and an empty reason, and return the per-test
    /// handle. Tests without metadata, disabled sessions, already-terminal
    /// results, and remote failures all yield an inert handle.
    pub fn starting(&self, description: &TestDescription) -> ActiveResult {
        let inert = || ActiveResult::inert(Arc::clone(&self.session));
        if description.metadata.is_none() || self.is_finished(description) {
            return inert();
        }
        let Some(result) = self.session.get_or_create_result(description) else {
            return inert();
        };
        let (Some(result_id), Some(client)) = (result.id.clone(), self.session.client()) else {
            return inert();
        };
        let update = ResultUpdate {
            started: Some(Utc::now()),
            reason: Some(String::new()),
            runstatus: Some(RunStatus::Running),
            ..Default::default()
        };
        match client.update_result(&result_id, &update) {
            Ok(_) => ActiveResult::bound(Arc::clone(&self.session), result_id),
            Err(err) => {
                error!(
                    test = %description.display_name(),
                    error = %err,
                    "unable to mark result running"
                );
                inert()
            }
        }
    }

    /// A test passed.
    pub fn succeeded(&self, description: &TestDescription) {
        self.finish(
            description,
            ResultUpdate {
                status: Some(ResultStatus::Pass),
                runstatus: Some(RunStatus::Finished),
                finished: Some(Utc::now()),
                ..Default::default()
            },
        );
    }

    /// A test failed: the recorded reason is the failure message followed
    /// by the full trace text.
    pub fn failed(&self, description: &TestDescription, failure: &TestFailure) {
        self.finish(
            description,
            ResultUpdate {
                status: Some(ResultStatus::Fail),
                runstatus: Some(RunStatus::Finished),
                finished: Some(Utc::now()),
                reason: Some(failure.reason_text()),
                ..Default::default()
            },
        );
    }

    /// A test was skipped, recorded according to the configured
    /// [`SkipPolicy`].
    pub fn skipped(&self, description: &TestDescription, reason: &str) {
        let (status, runstatus) = match self.skip_policy {
            SkipPolicy::MarkSkipped => (ResultStatus::Skipped, RunStatus::Finished),
            SkipPolicy::MarkFailed => (ResultStatus::Fail, RunStatus::Skipped),
        };
        self.finish(
            description,
            ResultUpdate {
                status: Some(status),
                runstatus: Some(runstatus),
                finished: Some(Utc::now()),
                reason: Some(reason.to_string()),
                ..Default::default()
            },
        );
    }

    fn is_finished(&self, description: &TestDescription) -> bool {
        let automation_id = self.session.automation_id_for(description);
        self.finished
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&automation_id)
    }

    /// Apply a terminal transition: no-op when the session is disabled, no
    /// result is registered, or the result is already terminal.
    fn finish(&self, description: &TestDescription, update: ResultUpdate) {
        let Some(result) = self.session.result_for(description) else {
            return;
        };
        let Some(result_id) = result.id else {
            return;
        };
        let automation_id = self.session.automation_id_for(description);
        {
            let mut finished = self.finished.lock().unwrap_or_else(|p| p.into_inner());
            if !finished.insert(automation_id) {
                return;
            }
        }
        let Some(client) = self.session.client() else {
            return;
        };
        if let Err(err) = client.update_result(&result_id, &update) {
            error!(
                test = %description.display_name(),
                error = %err,
                "unable to record result transition"
            );
        }
    }
}

/// Explicit per-test context for ad-hoc logging and file attachment.
///
/// Obtained from [`ResultTracker::starting`] and owned by the worker
/// thread or task running the test. An inert handle (no metadata, disabled
/// session) accepts every call and does nothing.
#[derive(Clone)]
pub struct ActiveResult {
    session: Arc<SessionController>,
    result_id: Option<String>,
}

impl ActiveResult {
    pub(crate) fn inert(session: Arc<SessionController>) -> Self {
        Self {
            session,
            result_id: None,
        }
    }

    pub(crate) fn bound(session: Arc<SessionController>, result_id: String) -> Self {
        Self {
            session,
            result_id: Some(result_id),
        }
    }

    /// Whether this handle is correlated to a remote result.
    pub fn is_bound(&self) -> bool {
        self.result_id.is_some()
    }

    /// The id of the correlated result, if any.
    pub fn result_id(&self) -> Option<&str> {
        self.result_id.as_deref()
    }

    /// Create a buffered logger writing to this result.
    pub fn logger(&self) -> crate::logbuffer::ResultLogger {
        crate::logbuffer::ResultLogger::new(self.clone())
    }

    /// Upload a file from disk and attach it to the current result. The
    /// mimetype is inferred from the file extension.
    pub fn attach_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if !self.is_bound() {
            warn!(path = %path.display(), "no active result; dropping file attachment");
            return;
        }
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) => {
                error!(path = %path.display(), error = %err, "unable to read file for attachment");
                return;
            }
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        self.attach_file_data(&file_name, mime_for_path(path), &data);
    }

    /// Upload in-memory data as a file and attach it to the current
    /// result.
    pub fn attach_file_data(&self, file_name: &str, mimetype: &str, data: &[u8]) {
        let (Some(result_id), Some(client)) = (&self.result_id, self.session.client()) else {
            warn!(file = file_name, "no active result; dropping file attachment");
            return;
        };
        let stored = match client.upload_file(file_name, mimetype, data) {
            Ok(stored) => stored,
            Err(err) => {
                error!(file = file_name, error = %err, "unable to upload file");
                return;
            }
        };
        let current = match client.result(result_id) {
            Ok(current) => current,
            Err(err) => {
                error!(result = %result_id, error = %err, "unable to fetch result for attachment");
                return;
            }
        };
        let mut files = current.files;
        files.push(stored);
        let update = ResultUpdate {
            files: Some(files),
            ..Default::default()
        };
        if let Err(err) = client.update_result(result_id, &update) {
            error!(result = %result_id, error = %err, "unable to attach file to result");
        }
    }

    /// Send a batch of log entries to the current result. Unbound handles
    /// accept and drop the batch.
    pub(crate) fn send_logs(&self, entries: &[LogEntry]) -> Result<(), SlickError> {
        let (Some(result_id), Some(client)) = (&self.result_id, self.session.client()) else {
            return Ok(());
        };
        client.add_result_logs(result_id, entries)
    }
}

/// Infer a mimetype from a file extension, falling back to a binary type.
fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("txt") | Some("log") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}
