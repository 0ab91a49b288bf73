//! Error taxonomy for remote reporting operations.
//!
//! Errors in this crate describe what the remote service did, not what the
//! caller should do about it. The propagation policy lives at the call
//! sites: session initialization failures disable the session, per-test
//! reconciliation failures drop the offending reference, and result-update
//! or log-upload failures are logged and swallowed. No error from this
//! crate ever reaches test code except through the explicit
//! [`add_result_for`](crate::session::SessionController::add_result_for)
//! path.

use thiserror::Error;

/// Errors returned by [`SlickClient`](crate::client::SlickClient)
/// implementations and surfaced by the session layer.
#[derive(Debug, Clone, Error)]
pub enum SlickError {
    /// The service could not be reached at all.
    #[error("slick server unreachable: {reason}")]
    RemoteUnavailable { reason: String },

    /// The service was reachable but refused the operation.
    #[error("slick server rejected {operation}: {reason}")]
    RemoteRejected {
        operation: &'static str,
        reason: String,
    },

    /// A lookup matched nothing. Callers use this as the decision branch
    /// for find-or-create, so it is frequently not an error at all.
    #[error("no {kind} named '{name}'")]
    NotFound { kind: &'static str, name: String },
}

impl SlickError {
    /// Construct an unreachable-server error from any displayable cause.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            reason: reason.into(),
        }
    }

    /// Construct a rejected-operation error.
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::RemoteRejected {
            operation,
            reason: reason.into(),
        }
    }

    /// Construct a not-found decision branch.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// True when this error is the not-found branch of a lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
