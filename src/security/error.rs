//! Error types for the security module

use thiserror::Error;

/// Result type for security operations
pub type SecurityResult<T> = Result<T, SecurityError>;

/// Security-specific errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecurityError {
    /// The admin already made a request in the current Pacific day
    #[error("admin '{admin_id}' has already made a request today")]
    DailyLimitReached { admin_id: String },

    /// A non-expired request from this admin is still active
    #[error("admin '{admin_id}' has an active request; retry in {remaining_secs}s")]
    ActiveRequestExists {
        admin_id: String,
        remaining_secs: i64,
    },

    /// Malformed admin identifier
    #[error("invalid admin id: {reason}")]
    InvalidAdminId { reason: String },
}

impl SecurityError {
    /// Create an invalid admin id error
    pub fn invalid_admin_id(reason: impl Into<String>) -> Self {
        Self::InvalidAdminId {
            reason: reason.into(),
        }
    }

    /// Rate-limit rejections are retryable after time passes
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            Self::DailyLimitReached { .. } | Self::ActiveRequestExists { .. }
        )
    }
}
