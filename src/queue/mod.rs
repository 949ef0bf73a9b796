//! Approved-work queue and its execution machinery
//!
//! Approved update requests wait here until the processor may legally run
//! them. The queue is bounded (capacity is the platform's only backpressure
//! mechanism) and ordered by priority, owner requests first, oldest first
//! within a class.
//!
//! # Modules
//!
//! - [`policy`] - Cooldown and blackout-window execution policy
//! - [`processor`] - The adaptive polling loop that drains the queue

pub mod policy;
pub mod processor;

pub use policy::{PolicyViolation, TimePolicy};
pub use processor::{ExecutionRecord, Processor, ProcessorEvent, ProcessorStats};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::QueueConfig;
use crate::models::{RequestType, UpdateRequest};

/// An approved request waiting for execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: String,
    pub requester_id: String,
    pub requester_name: String,
    pub request_type: RequestType,

    /// Derived from `request_type`; higher executes first
    pub priority: u8,

    /// The approved request as it looked when it entered the queue
    pub data: UpdateRequest,

    pub enqueued_at: DateTime<Utc>,
}

impl QueuedRequest {
    fn from_request(request: UpdateRequest, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: request.id.clone(),
            requester_id: request.requester_id.clone(),
            requester_name: request.requester_name.clone(),
            request_type: request.request_type,
            priority: request.request_type.priority(),
            data: request,
            enqueued_at,
        }
    }
}

/// Queue snapshot for the monitoring surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue_size: usize,
    pub capacity: usize,
    pub owner_requests: usize,
    pub democratic_requests: usize,
    pub oldest_enqueued_at: Option<DateTime<Utc>>,
}

/// Bounded, priority-ordered holding area for approved requests
pub struct RequestQueue {
    items: RwLock<Vec<QueuedRequest>>,
    capacity: usize,
}

impl RequestQueue {
    /// Create a queue with the configured capacity
    pub fn new(config: QueueConfig) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            capacity: config.capacity,
        }
    }

    /// Maximum outstanding requests
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an approved request
    ///
    /// Returns `false` without touching the queue when it is at capacity;
    /// the caller must surface the busy condition rather than drop the work.
    pub async fn enqueue(&self, request: UpdateRequest, now: DateTime<Utc>) -> bool {
        let mut items = self.items.write().await;
        if items.len() >= self.capacity {
            debug!(
                request_id = %request.id,
                capacity = self.capacity,
                "enqueue refused: queue at capacity"
            );
            return false;
        }

        let queued = QueuedRequest::from_request(request, now);
        debug!(
            request_id = %queued.id,
            request_type = %queued.request_type,
            position = items.len(),
            "request enqueued"
        );
        items.push(queued);
        true
    }

    /// Remove and return the next request by selection order
    ///
    /// Priority descending, then enqueue time ascending: owner requests jump
    /// the line, but within a class it is first-in-first-out.
    pub async fn dequeue_next(&self) -> Option<QueuedRequest> {
        let mut items = self.items.write().await;
        let best = items
            .iter()
            .enumerate()
            .min_by_key(|(_, item)| (std::cmp::Reverse(item.priority), item.enqueued_at))
            .map(|(index, _)| index)?;
        Some(items.remove(best))
    }

    /// Number of outstanding requests
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether the queue currently holds no work
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Point-in-time copy of the queue in selection order, not a live view
    pub async fn snapshot(&self) -> Vec<QueuedRequest> {
        let items = self.items.read().await;
        let mut copy: Vec<QueuedRequest> = items.clone();
        copy.sort_by_key(|item| (std::cmp::Reverse(item.priority), item.enqueued_at));
        copy
    }

    /// Counts for the monitoring surface
    pub async fn stats(&self) -> QueueStats {
        let items = self.items.read().await;
        QueueStats {
            queue_size: items.len(),
            capacity: self.capacity,
            owner_requests: items
                .iter()
                .filter(|i| i.request_type == RequestType::ForceUpdate)
                .count(),
            democratic_requests: items
                .iter()
                .filter(|i| i.request_type == RequestType::DemocraticUpdate)
                .count(),
            oldest_enqueued_at: items.iter().map(|i| i.enqueued_at).min(),
        }
    }
}
