//! Approved-content insertion batching
//!
//! Product submissions are decided by a single admin, no voting. Approvals
//! become [`QueuedInsertion`] entries scheduled for the next Pacific
//! midnight; a batch run drains the queue into the datastore, and a sweep
//! deletes submissions left pending for too long.
//!
//! Items that still fail after in-run retries move to a bounded
//! needs-attention list instead of being dropped silently, so an operator
//! can resubmit them. The live queue is always empty at the end of a run.
//!
//! The batch entry point is externally triggered; [`InsertionScheduler::run`]
//! is an optional built-in trigger that sleeps until each midnight boundary.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::collaborators::ProductSink;
use crate::config::InsertionConfig;
use crate::models::{ProductRequest, QueuedInsertion, ReviewDecision};
use crate::security::clock;
use crate::store::{RequestStore, StoreResult};
use crate::utils::retry::{with_retry, RetryConfig};

/// An insertion that failed every in-run retry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedInsertion {
    pub insertion: QueuedInsertion,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Summary of one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertionRunReport {
    pub run_at: DateTime<Utc>,
    pub attempted: usize,
    pub inserted: usize,
    pub failed: usize,
    pub swept: usize,
}

/// Scheduler snapshot for the monitoring surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertionStats {
    pub queued_insertions: usize,
    pub needs_attention: usize,
    pub next_scheduled_run: Option<DateTime<Utc>>,
    pub total_inserted: u64,
    pub total_failed: u64,
    pub total_swept: u64,
    pub last_run_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct InsertionTotals {
    inserted: u64,
    failed: u64,
    swept: u64,
    last_run_at: Option<DateTime<Utc>>,
}

/// Batches admin-approved products for the daily insertion run
pub struct InsertionScheduler {
    store: Arc<RequestStore>,
    sink: Arc<dyn ProductSink>,
    config: InsertionConfig,

    queue: RwLock<Vec<QueuedInsertion>>,
    needs_attention: RwLock<VecDeque<FailedInsertion>>,
    totals: RwLock<InsertionTotals>,
    is_running: Arc<RwLock<bool>>,
}

impl InsertionScheduler {
    /// Create a scheduler over the shared store and datastore sink
    pub fn new(store: Arc<RequestStore>, sink: Arc<dyn ProductSink>, config: InsertionConfig) -> Self {
        Self {
            store,
            sink,
            config,
            queue: RwLock::new(Vec::new()),
            needs_attention: RwLock::new(VecDeque::new()),
            totals: RwLock::new(InsertionTotals::default()),
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    fn pending_max_age(&self) -> Duration {
        Duration::days(self.config.pending_max_age_days)
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_delays(
            self.config.insert_max_retries,
            self.config.insert_retry_base_delay_ms,
            10_000,
        )
    }

    /// Apply a single admin's decision to a pending product request
    ///
    /// Approval schedules the payload for the next Pacific midnight strictly
    /// after `now`. Acting on an already-decided request fails.
    pub async fn review(
        &self,
        product_request_id: &str,
        admin_id: &str,
        decision: ReviewDecision,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<ProductRequest> {
        let reviewed = self
            .store
            .decide_product(product_request_id, admin_id, decision, notes, now)
            .await?;

        if decision == ReviewDecision::Approve {
            let scheduled = clock::next_midnight(now);
            let insertion = QueuedInsertion::from_request(&reviewed, admin_id, now, scheduled);
            info!(
                product_request_id,
                insertion_id = %insertion.id,
                scheduled_at = %scheduled,
                "product approved, queued for insertion"
            );
            self.queue.write().await.push(insertion);
        }

        Ok(reviewed)
    }

    /// Snapshot of the insertion queue
    pub async fn queued(&self) -> Vec<QueuedInsertion> {
        self.queue.read().await.clone()
    }

    /// Items that failed their last batch run and await operator attention
    pub async fn needs_attention(&self) -> Vec<FailedInsertion> {
        self.needs_attention.read().await.iter().cloned().collect()
    }

    /// Drain the queue into the datastore and sweep stale submissions
    ///
    /// Each item gets bounded in-run retries. Successes mark the originating
    /// request `Approved`; exhausted failures land on the needs-attention
    /// list. Either way the live queue is empty when this returns.
    pub async fn process_queued_insertions(&self, now: DateTime<Utc>) -> InsertionRunReport {
        let batch: Vec<QueuedInsertion> = std::mem::take(&mut *self.queue.write().await);
        let retry = self.retry_config();

        info!(count = batch.len(), "starting insertion batch run");

        let attempted = batch.len();
        let mut inserted = 0;
        let mut failed = 0;

        for item in batch {
            let result = with_retry(&retry, || self.sink.insert(&item.product_details)).await;
            match result {
                Ok(()) => {
                    self.store.mark_product_inserted(&item.original_request_id).await;
                    inserted += 1;
                    info!(
                        insertion_id = %item.id,
                        original_request_id = %item.original_request_id,
                        "product inserted into datastore"
                    );
                }
                Err(err) => {
                    failed += 1;
                    error!(
                        insertion_id = %item.id,
                        error = %err,
                        "insertion failed after retries, moved to needs-attention"
                    );
                    let mut attention = self.needs_attention.write().await;
                    if attention.len() >= self.config.needs_attention_limit {
                        attention.pop_front();
                    }
                    attention.push_back(FailedInsertion {
                        insertion: item,
                        error: err.to_string(),
                        failed_at: now,
                    });
                }
            }
        }

        let swept_requests = self
            .store
            .sweep_stale_products(now, self.pending_max_age())
            .await;
        for request in &swept_requests {
            warn!(
                product_request_id = %request.id,
                created_at = %request.created_at,
                "swept abandoned pending product request"
            );
        }
        let swept = swept_requests.len();

        {
            let mut totals = self.totals.write().await;
            totals.inserted += inserted as u64;
            totals.failed += failed as u64;
            totals.swept += swept as u64;
            totals.last_run_at = Some(now);
        }

        info!(attempted, inserted, failed, swept, "insertion batch run finished");
        InsertionRunReport {
            run_at: now,
            attempted,
            inserted,
            failed,
            swept,
        }
    }

    /// Run the built-in midnight trigger until stopped
    ///
    /// Sleeps until each Pacific midnight boundary and invokes the batch.
    /// Deployments that already own a trigger should call
    /// [`process_queued_insertions`](Self::process_queued_insertions) instead.
    pub async fn run(&self) {
        *self.is_running.write().await = true;
        info!("insertion trigger started");

        while *self.is_running.read().await {
            let now = Utc::now();
            let next = clock::next_midnight(now);
            let sleep_for = (next - now)
                .to_std()
                .unwrap_or(std::time::Duration::from_secs(60));

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    self.process_queued_insertions(Utc::now()).await;
                }
                _ = self.wait_for_stop() => {
                    break;
                }
            }
        }

        info!("insertion trigger stopped");
    }

    /// Stop the built-in trigger loop
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
    }

    /// Check whether the trigger loop is active
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    async fn wait_for_stop(&self) {
        loop {
            if !*self.is_running.read().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }

    /// Scheduler snapshot for the monitoring surface
    pub async fn stats(&self) -> InsertionStats {
        let queue = self.queue.read().await;
        let totals = self.totals.read().await;

        InsertionStats {
            queued_insertions: queue.len(),
            needs_attention: self.needs_attention.read().await.len(),
            next_scheduled_run: queue.iter().map(|i| i.scheduled_insertion_time).min(),
            total_inserted: totals.inserted,
            total_failed: totals.failed,
            total_swept: totals.swept,
            last_run_at: totals.last_run_at,
        }
    }
}
