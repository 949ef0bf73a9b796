//! Contracts for the external systems this core drives
//!
//! The governance core never talks to the web layer, the identity provider,
//! or the datastore directly; it goes through the traits here. Each trait has
//! a small in-memory implementation used by the demo binary and the test
//! suites. Production deployments supply their own implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;
use tracing::info;

/// Authority attributes of a requester
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Authority {
    pub is_admin: bool,
    pub is_owner: bool,
}

/// Identity lookup used for owner detection and vote threshold math
#[async_trait]
pub trait AuthorityProvider: Send + Sync {
    /// Authority attributes for a requester id (unknown ids get defaults)
    async fn get_authority(&self, requester_id: &str) -> Authority;

    /// Total number of admins eligible to vote
    async fn admin_count(&self) -> u32;
}

/// The privileged full data refresh operation
#[async_trait]
pub trait RefreshExecutor: Send + Sync {
    /// Run the full refresh; errors are recorded, never retried here
    async fn perform_full_refresh(&self) -> anyhow::Result<()>;

    /// When the last successful refresh finished, for the cooldown check
    async fn last_execution_time(&self) -> Option<DateTime<Utc>>;
}

/// Datastore write target for approved product payloads
#[async_trait]
pub trait ProductSink: Send + Sync {
    async fn insert(&self, product_details: &serde_json::Value) -> anyhow::Result<()>;
}

/// Pre-filter consulted before a product request enters the core
#[async_trait]
pub trait DuplicateChecker: Send + Sync {
    async fn is_duplicate(&self, product_details: &serde_json::Value) -> anyhow::Result<bool>;
}

// ============================================================================
// In-memory reference implementations
// ============================================================================

/// Fixed admin/owner sets, for tests and the demo binary
#[derive(Debug, Default)]
pub struct StaticAuthority {
    admins: HashSet<String>,
    owners: HashSet<String>,
}

impl StaticAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an admin id
    pub fn with_admin(mut self, id: impl Into<String>) -> Self {
        self.admins.insert(id.into());
        self
    }

    /// Register an owner id (owners are admins too)
    pub fn with_owner(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.admins.insert(id.clone());
        self.owners.insert(id);
        self
    }
}

#[async_trait]
impl AuthorityProvider for StaticAuthority {
    async fn get_authority(&self, requester_id: &str) -> Authority {
        Authority {
            is_admin: self.admins.contains(requester_id),
            is_owner: self.owners.contains(requester_id),
        }
    }

    async fn admin_count(&self) -> u32 {
        self.admins.len() as u32
    }
}

/// Refresh executor that only logs, stamping its own execution time
///
/// `fail_times` makes the next N executions fail, which the processor tests
/// use to exercise the failure path.
#[derive(Debug, Default)]
pub struct LoggingRefreshExecutor {
    last_execution: RwLock<Option<DateTime<Utc>>>,
    executions: AtomicU32,
    fail_times: AtomicU32,
}

impl LoggingRefreshExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-set the last execution time (cooldown tests)
    pub async fn set_last_execution(&self, at: DateTime<Utc>) {
        *self.last_execution.write().await = Some(at);
    }

    /// Make the next `n` executions fail
    pub fn fail_next(&self, n: u32) {
        self.fail_times.store(n, Ordering::SeqCst);
    }

    /// How many refreshes ran (successful or not)
    pub fn execution_count(&self) -> u32 {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshExecutor for LoggingRefreshExecutor {
    async fn perform_full_refresh(&self) -> anyhow::Result<()> {
        self.executions.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_times.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("simulated refresh failure");
        }

        info!("full data refresh executed");
        *self.last_execution.write().await = Some(Utc::now());
        Ok(())
    }

    async fn last_execution_time(&self) -> Option<DateTime<Utc>> {
        *self.last_execution.read().await
    }
}

/// Collects inserted payloads in memory
#[derive(Debug, Default)]
pub struct MemoryProductSink {
    inserted: RwLock<Vec<serde_json::Value>>,
    fail_times: AtomicU32,
}

impl MemoryProductSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` inserts fail
    pub fn fail_next(&self, n: u32) {
        self.fail_times.store(n, Ordering::SeqCst);
    }

    /// Snapshot of everything written so far
    pub async fn inserted(&self) -> Vec<serde_json::Value> {
        self.inserted.read().await.clone()
    }
}

#[async_trait]
impl ProductSink for MemoryProductSink {
    async fn insert(&self, product_details: &serde_json::Value) -> anyhow::Result<()> {
        let remaining = self.fail_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_times.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("simulated datastore write failure");
        }
        self.inserted.write().await.push(product_details.clone());
        Ok(())
    }
}

/// Remembers serialized payloads and flags repeats
#[derive(Debug, Default)]
pub struct MemoryDuplicateChecker {
    seen: RwLock<HashSet<String>>,
}

impl MemoryDuplicateChecker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DuplicateChecker for MemoryDuplicateChecker {
    async fn is_duplicate(&self, product_details: &serde_json::Value) -> anyhow::Result<bool> {
        let key = product_details.to_string();
        let mut seen = self.seen.write().await;
        Ok(!seen.insert(key))
    }
}
