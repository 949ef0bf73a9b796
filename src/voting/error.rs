//! Error types for the voting module

use chrono::NaiveDate;
use thiserror::Error;

use crate::security::SecurityError;
use crate::store::StoreError;

/// Result type for voting operations
pub type VotingResult<T> = Result<T, VotingError>;

/// Voting-specific errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VotingError {
    /// Rejected by the per-admin rate limiter or id validation
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// Store-level transition failure (unknown id, double vote, expired, ...)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The platform-wide democratic update was already used today
    #[error("a democratic update was already requested on {date}; try again tomorrow")]
    DemocraticUpdateUsed { date: NaiveDate },

    /// The request queue is at capacity; the system is busy
    #[error("request queue is full ({capacity} outstanding); try again later")]
    QueueFull { capacity: usize },

    /// The requester is not a known admin
    #[error("requester '{requester_id}' is not an admin")]
    NotAuthorized { requester_id: String },
}

impl VotingError {
    /// Create a not-authorized error
    pub fn not_authorized(requester_id: impl Into<String>) -> Self {
        Self::NotAuthorized {
            requester_id: requester_id.into(),
        }
    }
}
