//! updraft - Admin governance core for daily content refreshes
//!
//! A governance layer for a multi-admin content platform. It decides whether
//! and when a privileged full data refresh may run, and batches admin-approved
//! content submissions for insertion at a fixed daily instant.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`security`] - Per-admin daily rate limiting and day-boundary clock math
//! - [`store`] - Source-of-truth store for update and product requests
//! - [`voting`] - The democratic approval engine and owner fast path
//! - [`queue`] - Bounded priority queue, execution policy, and the processor loop
//! - [`insertion`] - Approved-content batching and the midnight insertion run
//! - [`collaborators`] - Contracts for the external systems this core drives
//! - [`service`] - Facade exposing the governance operations
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use updraft::config::Config;
//! use updraft::collaborators::StaticAuthority;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let authority = StaticAuthority::new().with_owner("owner-1");
//!     // Wire the service with real collaborators here.
//!     Ok(())
//! }
//! ```

pub mod collaborators;
pub mod config;
pub mod error;
pub mod insertion;
pub mod models;
pub mod queue;
pub mod security;
pub mod service;
pub mod store;
pub mod utils;
pub mod voting;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::models::{
        ProductRequest, ProductStatus, RequestStatus, RequestType, UpdateRequest, VoteChoice,
    };
    pub use crate::queue::{Processor, RequestQueue, TimePolicy};
    pub use crate::security::RateLimiter;
    pub use crate::service::GovernanceService;
    pub use crate::store::RequestStore;
    pub use crate::voting::VotingEngine;
}

// Direct re-exports for convenience
pub use models::{ProductRequest, RequestStatus, RequestType, UpdateRequest, VoteChoice};
