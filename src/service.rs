//! Governance service facade
//!
//! Wires the rate limiter, stores, voting engine, queue machinery, and
//! insertion scheduler together and exposes the operations the transport
//! layer calls. Every operation returns a typed [`Result`]; the serializable
//! [`ResponseEnvelope`] carries the same outcome as a tagged
//! `{success, data}` / `{success, error, message}` shape for transports that
//! cannot convey a status out of band.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::collaborators::{AuthorityProvider, DuplicateChecker, ProductSink, RefreshExecutor};
use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::insertion::{InsertionScheduler, InsertionStats};
use crate::models::{ProductRequest, ReviewDecision, UpdateRequest, VoteChoice};
use crate::queue::{Processor, ProcessorStats, QueueStats, RequestQueue};
use crate::security::{RateLimiter, SecurityStats};
use crate::store::RequestStore;
use crate::voting::{VoteTally, VotingEngine};

/// Tagged result shape for non-HTTP transports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ResponseEnvelope<T> {
    /// Successful outcome carrying data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    /// Failed outcome carrying the error kind and human-readable reason
    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.kind()),
            message: Some(err.to_string()),
        }
    }
}

impl<T> From<Result<T>> for ResponseEnvelope<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failure(&err),
        }
    }
}

/// The assembled governance core
pub struct GovernanceService {
    config: Config,
    limiter: Arc<RateLimiter>,
    store: Arc<RequestStore>,
    queue: Arc<RequestQueue>,
    engine: VotingEngine,
    processor: Arc<Processor>,
    insertion: Arc<InsertionScheduler>,
    duplicates: Arc<dyn DuplicateChecker>,
}

impl GovernanceService {
    /// Wire the core from configuration and collaborator implementations
    pub fn new(
        config: Config,
        authority: Arc<dyn AuthorityProvider>,
        executor: Arc<dyn RefreshExecutor>,
        sink: Arc<dyn ProductSink>,
        duplicates: Arc<dyn DuplicateChecker>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.security.clone()));
        let store = Arc::new(RequestStore::new());
        let queue = Arc::new(RequestQueue::new(config.queue.clone()));

        let engine = VotingEngine::new(
            Arc::clone(&limiter),
            Arc::clone(&store),
            Arc::clone(&queue),
            authority,
            config.voting.clone(),
        );
        let processor = Arc::new(Processor::new(
            Arc::clone(&queue),
            executor,
            config.processor.clone(),
        ));
        let insertion = Arc::new(InsertionScheduler::new(
            Arc::clone(&store),
            sink,
            config.insertion.clone(),
        ));

        Self {
            config,
            limiter,
            store,
            queue,
            engine,
            processor,
            insertion,
            duplicates,
        }
    }

    /// The processor loop handle, for spawning
    pub fn processor(&self) -> Arc<Processor> {
        Arc::clone(&self.processor)
    }

    /// The insertion scheduler handle, for spawning or external triggering
    pub fn insertion(&self) -> Arc<InsertionScheduler> {
        Arc::clone(&self.insertion)
    }

    // ------------------------------------------------------------------
    // Update requests
    // ------------------------------------------------------------------

    /// Submit a full-refresh request (owner fast path or democratic)
    pub async fn create_update_request(
        &self,
        requester_id: &str,
        requester_name: &str,
        now: DateTime<Utc>,
    ) -> Result<UpdateRequest> {
        Ok(self
            .engine
            .create_request(requester_id, requester_name, now)
            .await?)
    }

    /// Cast a vote on a pending request
    pub async fn vote_on_request(
        &self,
        request_id: &str,
        admin_id: &str,
        choice: VoteChoice,
        now: DateTime<Utc>,
    ) -> Result<VoteTally> {
        Ok(self.engine.vote(request_id, admin_id, choice, now).await?)
    }

    /// All update requests still pending at `now`
    pub async fn pending_requests(&self, now: DateTime<Utc>) -> Vec<UpdateRequest> {
        self.store.pending_updates(now).await
    }

    /// Fetch one update request by id
    pub async fn request_by_id(&self, request_id: &str, now: DateTime<Utc>) -> Result<UpdateRequest> {
        self.store
            .get_update(request_id, now)
            .await
            .ok_or_else(|| {
                crate::store::StoreError::UpdateNotFound {
                    id: request_id.to_string(),
                }
                .into()
            })
    }

    // ------------------------------------------------------------------
    // Product requests
    // ------------------------------------------------------------------

    /// Submit a product for review, after the duplicate pre-filter
    pub async fn submit_product_request(
        &self,
        requester_name: &str,
        product_details: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<ProductRequest> {
        let duplicate = self
            .duplicates
            .is_duplicate(&product_details)
            .await
            .map_err(Error::execution)?;
        if duplicate {
            return Err(Error::validation("product already exists or is pending"));
        }

        let request = ProductRequest::new(
            requester_name,
            product_details,
            now,
            Duration::days(self.config.insertion.pending_max_age_days),
        );
        self.store.insert_product(request.clone()).await;
        info!(
            product_request_id = %request.id,
            requester = requester_name,
            "product request submitted for review"
        );
        Ok(request)
    }

    /// Apply a single admin's review decision
    pub async fn review_product_request(
        &self,
        product_request_id: &str,
        admin_id: &str,
        decision: ReviewDecision,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ProductRequest> {
        self.limiter.validate_admin_id(admin_id)?;
        Ok(self
            .insertion
            .review(product_request_id, admin_id, decision, notes, now)
            .await?)
    }

    /// All product requests awaiting review
    pub async fn pending_product_requests(&self) -> Vec<ProductRequest> {
        self.store.pending_products().await
    }

    // ------------------------------------------------------------------
    // Monitoring and maintenance
    // ------------------------------------------------------------------

    /// Rate limiter snapshot
    pub async fn security_stats(&self, now: DateTime<Utc>) -> SecurityStats {
        self.limiter.stats(now).await
    }

    /// Request queue snapshot
    pub async fn queue_stats(&self) -> QueueStats {
        self.queue.stats().await
    }

    /// Processor snapshot
    pub async fn processor_stats(&self) -> ProcessorStats {
        self.processor.stats().await
    }

    /// Insertion scheduler snapshot
    pub async fn insertion_stats(&self) -> InsertionStats {
        self.insertion.stats().await
    }

    /// Privileged: clear expired active-request flags and stale pending state
    pub async fn cleanup_expired_requests(&self, now: DateTime<Utc>) -> usize {
        let cleared = self.limiter.cleanup_expired_requests(now).await;
        let expired = self.store.expire_stale_updates(now).await;
        info!(cleared, expired, "expired-request cleanup completed");
        cleared + expired
    }
}
