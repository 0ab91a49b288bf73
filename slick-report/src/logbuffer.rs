//! Buffered per-result logging with a dual size/time flush policy.
//!
//! A [`ResultLogger`] accumulates [`LogEntry`] records for one active
//! result and flushes them to the remote service as a batch. The policy is
//! checked after every append: flush when the buffer reaches capacity
//! (default 10 entries) or when the oldest buffered entry is older than the
//! maximum age (default 5 seconds).
//!
//! Delivery is at most once per batch. A failed flush drops the batch and
//! logs the failure; buffering never blocks or fails the test that is
//! logging. This deliberately trades log completeness for test-run
//! liveness.

use crate::lifecycle::ActiveResult;
use crate::model::LogEntry;
use chrono::{TimeDelta, Utc};
use std::fmt;
use std::time::Duration;
use tracing::error;

/// Flush when the buffer holds this many entries.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10;

/// Flush when the oldest buffered entry is at least this old.
pub const DEFAULT_MAX_BUFFER_AGE: Duration = Duration::from_secs(5);

/// Logger name stamped on every entry.
pub const LOGGER_NAME: &str = "testcase";

/// Severity levels for buffered log entries, ranked like the remote
/// service ranks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Numeric rank used for threshold comparison.
    pub fn rank(self) -> u8 {
        match self {
            Self::Trace => 0,
            Self::Debug => 10,
            Self::Info => 50,
            Self::Warn => 70,
            Self::Error => 100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exception detail recorded alongside a log entry.
#[derive(Debug, Clone, Default)]
pub struct ErrorInfo {
    /// The error's type or class name.
    pub class_name: String,
    /// The error's own message.
    pub message: String,
    /// Flattened stack or cause frames.
    pub frames: Vec<String>,
}

impl ErrorInfo {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            frames: Vec::new(),
        }
    }

    pub fn with_frames(mut self, frames: Vec<String>) -> Self {
        self.frames = frames;
        self
    }

    /// Capture a typed error, using its type name as the class name and
    /// its source chain as the frames.
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let mut frames = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            frames.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        Self {
            class_name: std::any::type_name::<E>().to_string(),
            message: err.to_string(),
            frames,
        }
    }
}

/// Buffered logger bound to one [`ActiveResult`].
///
/// Each executing test owns its own logger; the handle it wraps determines
/// which result the batches land on. Entries logged against an inert
/// handle are dropped without buffering.
pub struct ResultLogger {
    target: ActiveResult,
    minimum_level: LogLevel,
    capacity: usize,
    max_age: Duration,
    buffer: Vec<LogEntry>,
}

impl ResultLogger {
    /// Create a logger with the default threshold and flush policy.
    pub fn new(target: ActiveResult) -> Self {
        Self::with_policy(target, DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_BUFFER_AGE)
    }

    /// Create a logger with an explicit flush policy. Mostly useful for
    /// tests that cannot wait out the default age.
    pub fn with_policy(target: ActiveResult, capacity: usize, max_age: Duration) -> Self {
        Self {
            target,
            minimum_level: LogLevel::Debug,
            capacity: capacity.max(1),
            max_age,
            buffer: Vec::new(),
        }
    }

    pub fn minimum_level(&self) -> LogLevel {
        self.minimum_level
    }

    pub fn set_minimum_level(&mut self, level: LogLevel) {
        self.minimum_level = level;
    }

    /// Whether entries at `level` would be buffered.
    pub fn is_level_enabled(&self, level: LogLevel) -> bool {
        level.rank() >= self.minimum_level.rank()
    }

    /// Number of entries currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append a pre-built entry and evaluate the flush policy. Entries are
    /// dropped when the handle is not bound to a result.
    pub fn add_entry(&mut self, entry: LogEntry) {
        if !self.target.is_bound() {
            return;
        }
        self.buffer.push(entry);
        self.flush_if_needed();
    }

    /// Log a plain message.
    pub fn log(&mut self, level: LogLevel, message: &str) {
        if self.is_level_enabled(level) {
            self.add_entry(self.entry_for(level, message.to_string()));
        }
    }

    /// Log a message with positional `{0}`/`{1}` substitution.
    pub fn log_fmt(&mut self, level: LogLevel, format: &str, args: &[&dyn fmt::Display]) {
        if self.is_level_enabled(level) {
            self.add_entry(self.entry_for(level, format_positional(format, args)));
        }
    }

    /// Log a message with captured error detail: class name, message, and
    /// flattened frames are recorded on the entry.
    pub fn log_err(&mut self, level: LogLevel, message: &str, error: &ErrorInfo) {
        if self.is_level_enabled(level) {
            let mut entry = self.entry_for(level, message.to_string());
            entry.exception_class_name = Some(error.class_name.clone());
            entry.exception_message = Some(error.message.clone());
            entry.exception_stack_trace = error.frames.clone();
            self.add_entry(entry);
        }
    }

    pub fn trace(&mut self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&mut self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&mut self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Send the whole buffer as one batch and clear it, whether or not the
    /// send succeeded. No-op on an empty buffer or an unbound handle.
    pub fn flush(&mut self) {
        if self.buffer.is_empty() || !self.target.is_bound() {
            return;
        }
        let batch = std::mem::take(&mut self.buffer);
        if let Err(err) = self.target.send_logs(&batch) {
            error!(
                error = %err,
                entries = batch.len(),
                "unable to post logs to slick; batch dropped"
            );
        }
    }

    fn flush_if_needed(&mut self) {
        if self.buffer.len() >= self.capacity {
            self.flush();
            return;
        }
        let Some(oldest) = self.buffer.first().and_then(|e| e.entry_time) else {
            return;
        };
        let max_age = TimeDelta::from_std(self.max_age).unwrap_or(TimeDelta::MAX);
        if Utc::now() - oldest >= max_age {
            self.flush();
        }
    }

    fn entry_for(&self, level: LogLevel, message: String) -> LogEntry {
        LogEntry {
            entry_time: Some(Utc::now()),
            level: level.to_string(),
            logger_name: LOGGER_NAME.to_string(),
            message,
            ..Default::default()
        }
    }
}

/// Substitute `{0}`, `{1}`, ... with the corresponding argument.
fn format_positional(format: &str, args: &[&dyn fmt::Display]) -> String {
    let mut message = format.to_string();
    for (index, arg) in args.iter().enumerate() {
        message = message.replace(&format!("{{{index}}}"), &arg.to_string());
    }
    message
}
