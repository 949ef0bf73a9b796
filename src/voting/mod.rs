//! Update-request creation and democratic approval
//!
//! An admin asking for a full data refresh goes through two gates: the
//! per-admin rate limiter, and either the owner fast path (immediate
//! approval) or a vote of all admins. A democratic request passes when
//! approvals reach `ceil(approval_ratio * admin_count)`; reject votes only
//! accumulate and never terminate a request early.
//!
//! # Example
//!
//! ```ignore
//! let engine = VotingEngine::new(limiter, store, queue, authority, config);
//!
//! let request = engine.create_request("admin-1", "Alice", Utc::now()).await?;
//! let tally = engine
//!     .vote(&request.id, "admin-2", VoteChoice::Approve, Utc::now())
//!     .await?;
//! println!("{}/{} approvals", tally.approve_count, tally.required_approvals);
//! ```

pub mod engine;
pub mod error;

pub use engine::{required_approvals, VoteTally, VotingEngine};
pub use error::{VotingError, VotingResult};
