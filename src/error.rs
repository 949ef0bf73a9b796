//! Unified error handling for the updraft crate
//!
//! Each module has its own domain error type; this module wraps them in a
//! single [`Error`] enum and classifies every error into an [`ErrorKind`],
//! the machine-distinguishable half of the tagged results callers receive.
//! The human-readable half is the `Display` output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::queue::policy::PolicyViolation;
pub use crate::security::error::SecurityError;
pub use crate::store::StoreError;
pub use crate::voting::error::VotingError;

/// Classification of errors for callers
///
/// Callers branch on the kind and render the message; they must never have
/// to parse the message to find out what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Daily quota, active-request conflict, democratic slot, or full queue
    RateLimited,
    /// Unknown request id
    NotFound,
    /// Voting on a non-pending request, double votes, re-reviewing
    InvalidState,
    /// Malformed id or payload
    Validation,
    /// The external refresh or datastore write failed
    ExecutionFailure,
    /// Cooldown or blackout window active at execution time
    PolicyViolation,
}

impl ErrorKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
            Self::Validation => "validation_error",
            Self::ExecutionFailure => "execution_failure",
            Self::PolicyViolation => "policy_violation",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for the updraft crate
#[derive(Debug, Error)]
pub enum Error {
    /// Rate limiter and id validation errors
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// Store-level transition errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Voting engine errors
    #[error(transparent)]
    Voting(#[from] VotingError),

    /// Execution timing policy refusals
    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    /// Payload validation failures (duplicate submissions and the like)
    #[error("validation failed: {0}")]
    Validation(String),

    /// An external collaborator failed mid-operation
    #[error("execution failed: {0}")]
    Execution(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an execution failure from a collaborator error
    pub fn execution(err: impl std::fmt::Display) -> Self {
        Self::Execution(err.to_string())
    }

    /// Classify this error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Security(e) => match e {
                SecurityError::InvalidAdminId { .. } => ErrorKind::Validation,
                _ => ErrorKind::RateLimited,
            },
            Self::Store(e) => match e {
                StoreError::UpdateNotFound { .. } | StoreError::ProductNotFound { .. } => {
                    ErrorKind::NotFound
                }
                _ => ErrorKind::InvalidState,
            },
            Self::Voting(e) => match e {
                VotingError::Security(inner) => Self::Security(inner.clone()).kind(),
                VotingError::Store(inner) => Self::Store(inner.clone()).kind(),
                VotingError::DemocraticUpdateUsed { .. } | VotingError::QueueFull { .. } => {
                    ErrorKind::RateLimited
                }
                VotingError::NotAuthorized { .. } => ErrorKind::Validation,
            },
            Self::Policy(_) => ErrorKind::PolicyViolation,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Execution(_) => ErrorKind::ExecutionFailure,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
