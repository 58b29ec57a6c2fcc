//! Page controllers.
//!
//! Each controller owns the view-local state of one screen and sequences the
//! calls that populate it. Work is split in three steps so the UI can run the
//! network part on a background task:
//!
//! 1. `begin` validates input and issues a ticket (no network)
//! 2. `run` performs the calls and needs only shared handles
//! 3. `complete` applies the outcome on the UI task
//!
//! Validation failures never reach the network. Failed calls set an error
//! string and leave previously loaded data untouched. Outcomes carrying a
//! ticket that is no longer the latest of its kind are discarded.

pub mod dashboard;
pub mod login;
pub mod materiality;
pub mod signup;

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::StorageError;

pub use dashboard::{DashboardTab, FetchKind, FetchOutcome, FetchPayload, FetchTicket, TcfdDashboard};
pub use login::LoginForm;
pub use materiality::{MaterialityOutcome, MaterialityTable, MaterialityTicket};
pub use signup::SignupForm;

/// Input rejected before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Enter a valid email address")]
    InvalidEmail,

    #[error("Generate a report first")]
    NoReport,

    #[error("Choose PDF or Word to download")]
    NoDocumentFormat,
}

/// Why a controller action failed.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to save session: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to save document: {0:#}")]
    Save(anyhow::Error),
}

impl ActionError {
    /// Text for the inline error line.
    pub fn user_message(&self) -> String {
        match self {
            ActionError::Validation(e) => e.to_string(),
            ActionError::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Hands out generations for one kind of request. Only the most recently
/// issued generation is current.
#[derive(Debug, Default, Clone)]
pub(crate) struct RequestGate {
    latest: u64,
    in_flight: bool,
}

impl RequestGate {
    pub(crate) fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.in_flight = true;
        self.latest
    }

    /// Settle `generation`. Returns false when a newer request superseded it.
    pub(crate) fn settle(&mut self, generation: u64) -> bool {
        if generation != self.latest {
            return false;
        }
        self.in_flight = false;
        true
    }

    /// Retire the current generation without issuing a new one.
    pub(crate) fn cancel(&mut self) {
        self.latest += 1;
        self.in_flight = false;
    }

    pub(crate) fn in_flight(&self) -> bool {
        self.in_flight
    }
}

/// Trimmed value of a required field.
pub(crate) fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_only_latest_settles() {
        let mut gate = RequestGate::default();
        let first = gate.issue();
        let second = gate.issue();
        assert!(gate.in_flight());
        assert!(!gate.settle(first));
        assert!(gate.in_flight());
        assert!(gate.settle(second));
        assert!(!gate.in_flight());
    }

    #[test]
    fn test_cancelled_generation_never_settles() {
        let mut gate = RequestGate::default();
        let first = gate.issue();
        gate.cancel();
        assert!(!gate.in_flight());

        // A later request must not reuse the cancelled generation
        let second = gate.issue();
        assert_ne!(first, second);
        assert!(!gate.settle(first));
        assert!(gate.settle(second));
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  Acme ", "Company name"), Ok("Acme"));
        assert_eq!(
            required(" ", "Company name"),
            Err(ValidationError::Required("Company name"))
        );
        assert_eq!(
            ValidationError::Required("Company name").to_string(),
            "Company name is required"
        );
    }

    #[test]
    fn test_action_error_messages() {
        let err: ActionError = ApiError::Timeout.into();
        assert!(err.user_message().contains("timed out"));
        let err: ActionError = ValidationError::NoReport.into();
        assert_eq!(err.user_message(), "Generate a report first");
    }
}
