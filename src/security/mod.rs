//! Per-admin request rate limiting
//!
//! This module tracks admin request activity against a rolling Pacific-time
//! day boundary, limiting each admin to a single request per day and
//! preventing overlapping (active, non-expired) requests.
//!
//! # Modules
//!
//! - [`clock`] - Pure Pacific day-boundary math (DST approximated by month)
//! - [`limiter`] - The in-memory [`RateLimiter`] and its per-admin records
//!
//! # Example
//!
//! ```ignore
//! use updraft::security::RateLimiter;
//! use chrono::Utc;
//!
//! let limiter = RateLimiter::new(Default::default());
//! let now = Utc::now();
//!
//! limiter.check_request("admin-1", now).await?;
//! limiter.record_request("admin-1", now).await?;
//!
//! // Same admin, same day: rejected until the next Pacific midnight
//! assert!(!limiter.can_make_request("admin-1", now).await);
//! ```

pub mod clock;
pub mod error;
pub mod limiter;

pub use error::SecurityError;
pub use limiter::{AdminRecord, AdminStats, RateLimiter, SecurityStats};
