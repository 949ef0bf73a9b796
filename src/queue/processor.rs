//! The single-consumer execution loop
//!
//! Polls the request queue adaptively: short ticks while work is waiting,
//! longer ones while idle. Executing late is acceptable; executing against
//! policy is not, so the cooldown and blackout checks run immediately before
//! each execution, not at approval time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info};

use super::policy::{PolicyViolation, TimePolicy};
use super::{QueuedRequest, RequestQueue};
use crate::collaborators::RefreshExecutor;
use crate::config::ProcessorConfig;
use crate::models::RequestType;

/// Events emitted by the processor
#[derive(Debug, Clone)]
pub enum ProcessorEvent {
    /// A queued request passed the policy gate and began executing
    ExecutionStarted {
        request_id: String,
        request_type: RequestType,
    },

    /// An execution finished (successfully or not)
    ExecutionFinished {
        request_id: String,
        success: bool,
        duration_ms: u64,
    },

    /// The head of the queue was deferred by policy
    ExecutionDeferred { violation: PolicyViolation },
}

/// One entry in the bounded execution history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub request_id: String,
    pub request_type: RequestType,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Processor snapshot for the monitoring surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorStats {
    pub is_processing: bool,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,

    /// Mean execution latency, rounded to whole milliseconds
    pub average_duration_ms: u64,

    /// The 10 most recent execution records, newest first
    pub recent: Vec<ExecutionRecord>,
}

#[derive(Debug, Default)]
struct ExecutionTotals {
    total: u64,
    successful: u64,
    failed: u64,
    cumulative_ms: u64,
}

/// Outcome of a single poll tick
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing to do: queue empty or another execution in flight
    Idle,
    /// Policy refused the head of the queue; it stays queued
    Deferred(PolicyViolation),
    /// An item was dequeued and executed (see the record for success)
    Executed(ExecutionRecord),
}

/// Drains the request queue under the timing policy
pub struct Processor {
    queue: Arc<RequestQueue>,
    executor: Arc<dyn RefreshExecutor>,
    policy: TimePolicy,
    config: ProcessorConfig,

    is_processing: AtomicBool,
    is_running: Arc<RwLock<bool>>,
    history: RwLock<VecDeque<ExecutionRecord>>,
    totals: RwLock<ExecutionTotals>,
    event_sender: broadcast::Sender<ProcessorEvent>,
}

impl Processor {
    /// Create a processor over the shared queue and refresh collaborator
    pub fn new(
        queue: Arc<RequestQueue>,
        executor: Arc<dyn RefreshExecutor>,
        config: ProcessorConfig,
    ) -> Self {
        let (event_sender, _) = broadcast::channel(64);
        Self {
            queue,
            executor,
            policy: TimePolicy::new(&config),
            config,
            is_processing: AtomicBool::new(false),
            is_running: Arc::new(RwLock::new(false)),
            history: RwLock::new(VecDeque::new()),
            totals: RwLock::new(ExecutionTotals::default()),
            event_sender,
        }
    }

    /// Subscribe to processor events
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessorEvent> {
        self.event_sender.subscribe()
    }

    /// Run the polling loop until stopped
    pub async fn run(&self) {
        *self.is_running.write().await = true;
        info!(
            active_poll_secs = self.config.active_poll_secs,
            idle_poll_secs = self.config.idle_poll_secs,
            "queue processor started"
        );

        while *self.is_running.read().await {
            if let TickOutcome::Executed(record) = self.tick(Utc::now()).await {
                debug!(
                    request_id = %record.request_id,
                    success = record.success,
                    "tick executed a request"
                );
            }

            // Busy queues get the short interval, empty ones back off
            let secs = if self.queue.is_empty().await {
                self.config.idle_poll_secs
            } else {
                self.config.active_poll_secs
            };
            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
        }

        info!("queue processor stopped");
    }

    /// Stop the polling loop
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
    }

    /// Check whether the loop is active
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// One poll tick at `now`: consult policy, maybe execute the head item
    ///
    /// A tick that finds an execution already underway is a no-op. Policy is
    /// evaluated before dequeuing, so a deferred request keeps its place.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        if self
            .is_processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return TickOutcome::Idle;
        }

        let outcome = self.tick_inner(now).await;
        self.is_processing.store(false, Ordering::SeqCst);
        outcome
    }

    async fn tick_inner(&self, now: DateTime<Utc>) -> TickOutcome {
        if self.queue.is_empty().await {
            return TickOutcome::Idle;
        }

        let last_execution = self.executor.last_execution_time().await;
        if let Err(violation) = self.policy.check(now, last_execution) {
            debug!(%violation, "execution deferred by policy");
            let _ = self.event_sender.send(ProcessorEvent::ExecutionDeferred {
                violation: violation.clone(),
            });
            return TickOutcome::Deferred(violation);
        }

        let Some(item) = self.queue.dequeue_next().await else {
            return TickOutcome::Idle;
        };

        TickOutcome::Executed(self.execute(item).await)
    }

    /// Run the refresh for a dequeued item and record the outcome
    ///
    /// A failed execution is logged and consumed; this component never
    /// retries on its own.
    async fn execute(&self, item: QueuedRequest) -> ExecutionRecord {
        info!(
            request_id = %item.id,
            request_type = %item.request_type,
            requester = %item.requester_name,
            "executing full refresh"
        );
        let _ = self.event_sender.send(ProcessorEvent::ExecutionStarted {
            request_id: item.id.clone(),
            request_type: item.request_type,
        });

        let started = std::time::Instant::now();
        let result = self.executor.perform_full_refresh().await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let record = match result {
            Ok(()) => {
                info!(request_id = %item.id, duration_ms, "full refresh succeeded");
                ExecutionRecord {
                    request_id: item.id.clone(),
                    request_type: item.request_type,
                    executed_at: Utc::now(),
                    duration_ms,
                    success: true,
                    error: None,
                }
            }
            Err(err) => {
                error!(request_id = %item.id, duration_ms, error = %err, "full refresh failed");
                ExecutionRecord {
                    request_id: item.id.clone(),
                    request_type: item.request_type,
                    executed_at: Utc::now(),
                    duration_ms,
                    success: false,
                    error: Some(err.to_string()),
                }
            }
        };

        self.record(record.clone()).await;
        let _ = self.event_sender.send(ProcessorEvent::ExecutionFinished {
            request_id: record.request_id.clone(),
            success: record.success,
            duration_ms,
        });
        record
    }

    async fn record(&self, record: ExecutionRecord) {
        {
            let mut totals = self.totals.write().await;
            totals.total += 1;
            if record.success {
                totals.successful += 1;
            } else {
                totals.failed += 1;
            }
            totals.cumulative_ms += record.duration_ms;
        }

        let mut history = self.history.write().await;
        if history.len() >= self.config.history_limit {
            history.pop_front();
        }
        history.push_back(record);
    }

    /// Processor snapshot for the monitoring surface
    pub async fn stats(&self) -> ProcessorStats {
        let totals = self.totals.read().await;
        let history = self.history.read().await;

        let average_duration_ms = if totals.total > 0 {
            (totals.cumulative_ms as f64 / totals.total as f64).round() as u64
        } else {
            0
        };

        ProcessorStats {
            is_processing: self.is_processing.load(Ordering::SeqCst),
            total_executions: totals.total,
            successful_executions: totals.successful,
            failed_executions: totals.failed,
            average_duration_ms,
            recent: history.iter().rev().take(10).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::LoggingRefreshExecutor;
    use crate::config::QueueConfig;
    use crate::models::{RequestStatus, UpdateRequest};
    use chrono::{Duration, TimeZone};

    /// 12:00 PDT, well clear of the midnight blackout window
    ///
    /// Far enough in the future that the executor's own wall-clock success
    /// stamps never put a later test tick back inside the cooldown.
    fn midday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 7, 15, 19, 0, 0).unwrap()
    }

    fn approved(request_type: RequestType) -> UpdateRequest {
        let mut request = UpdateRequest::new(
            "admin-1",
            "Alice",
            request_type,
            midday(),
            Duration::minutes(10),
        );
        request.status = RequestStatus::Approved;
        request
    }

    fn setup() -> (Arc<RequestQueue>, Arc<LoggingRefreshExecutor>, Processor) {
        let queue = Arc::new(RequestQueue::new(QueueConfig { capacity: 10 }));
        let executor = Arc::new(LoggingRefreshExecutor::new());
        let processor = Processor::new(
            Arc::clone(&queue),
            Arc::clone(&executor) as Arc<dyn RefreshExecutor>,
            ProcessorConfig::default(),
        );
        (queue, executor, processor)
    }

    #[tokio::test]
    async fn test_tick_on_empty_queue_is_idle() {
        let (_, executor, processor) = setup();
        assert!(matches!(processor.tick(midday()).await, TickOutcome::Idle));
        assert_eq!(executor.execution_count(), 0);
    }

    #[tokio::test]
    async fn test_tick_executes_queued_request() {
        let (queue, executor, processor) = setup();
        queue.enqueue(approved(RequestType::ForceUpdate), midday()).await;

        let outcome = processor.tick(midday()).await;
        match outcome {
            TickOutcome::Executed(record) => {
                assert!(record.success);
                assert_eq!(record.request_type, RequestType::ForceUpdate);
            }
            other => panic!("expected execution, got {other:?}"),
        }
        assert_eq!(executor.execution_count(), 1);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_cooldown_defers_and_keeps_item_queued() {
        let (queue, executor, processor) = setup();
        executor.set_last_execution(midday() - Duration::minutes(30)).await;
        queue.enqueue(approved(RequestType::ForceUpdate), midday()).await;

        let outcome = processor.tick(midday()).await;
        assert!(matches!(
            outcome,
            TickOutcome::Deferred(PolicyViolation::CooldownActive { .. })
        ));
        assert_eq!(queue.len().await, 1);

        // Past the cooldown the same item executes
        let later = midday() + Duration::hours(2);
        assert!(matches!(
            processor.tick(later).await,
            TickOutcome::Executed(_)
        ));
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_blackout_defers_execution() {
        let (queue, _, processor) = setup();
        // 00:30 PDT: inside the window around the midnight maintenance hour
        let blackout = Utc.with_ymd_and_hms(2024, 7, 15, 7, 30, 0).unwrap();
        queue.enqueue(approved(RequestType::ForceUpdate), blackout).await;

        assert!(matches!(
            processor.tick(blackout).await,
            TickOutcome::Deferred(PolicyViolation::BlackoutWindow { .. })
        ));

        // Two hours later the window has passed
        assert!(matches!(
            processor.tick(blackout + Duration::hours(2)).await,
            TickOutcome::Executed(_)
        ));
    }

    #[tokio::test]
    async fn test_failed_execution_is_consumed_not_retried() {
        let (queue, executor, processor) = setup();
        executor.fail_next(1);
        queue.enqueue(approved(RequestType::DemocraticUpdate), midday()).await;

        let outcome = processor.tick(midday()).await;
        match outcome {
            TickOutcome::Executed(record) => {
                assert!(!record.success);
                assert!(record.error.is_some());
            }
            other => panic!("expected failed execution, got {other:?}"),
        }

        // The item is gone; the next tick has nothing to do
        assert!(queue.is_empty().await);
        assert!(matches!(processor.tick(midday()).await, TickOutcome::Idle));

        let stats = processor.stats().await;
        assert_eq!(stats.total_executions, 1);
        assert_eq!(stats.failed_executions, 1);
        assert_eq!(stats.successful_executions, 0);
    }

    #[tokio::test]
    async fn test_history_bounded_and_recent_capped() {
        let queue = Arc::new(RequestQueue::new(QueueConfig { capacity: 10 }));
        let processor = Processor::new(
            Arc::clone(&queue),
            Arc::new(LoggingRefreshExecutor::new()) as Arc<dyn RefreshExecutor>,
            ProcessorConfig {
                history_limit: 3,
                cooldown_secs: 0,
                ..Default::default()
            },
        );

        for _ in 0..5 {
            queue
                .enqueue(approved(RequestType::DemocraticUpdate), midday())
                .await;
            processor.tick(midday()).await;
        }

        let stats = processor.stats().await;
        assert_eq!(stats.total_executions, 5);
        assert_eq!(stats.recent.len(), 3);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let (queue, _, processor) = setup();
        let mut events = processor.subscribe();

        queue.enqueue(approved(RequestType::ForceUpdate), midday()).await;
        processor.tick(midday()).await;

        assert!(matches!(
            events.try_recv().unwrap(),
            ProcessorEvent::ExecutionStarted { .. }
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            ProcessorEvent::ExecutionFinished { success: true, .. }
        ));
    }
}
