//! The update-request state machine
//!
//! Owner requests are approved and queued in the same call; everything else
//! sits pending until enough admins approve. Both paths consume the
//! requester's daily quota exactly once, synchronously with creation, so an
//! admin can never have two requests in flight.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::error::{VotingError, VotingResult};
use crate::collaborators::AuthorityProvider;
use crate::config::VotingConfig;
use crate::models::{RequestStatus, RequestType, UpdateRequest, VoteChoice};
use crate::queue::RequestQueue;
use crate::security::{clock, RateLimiter};
use crate::store::RequestStore;

/// Approvals needed for a democratic request to pass
///
/// Rounded up, and never less than one even for an empty admin roster.
pub fn required_approvals(total_admins: u32, ratio: f64) -> u32 {
    ((total_admins as f64) * ratio).ceil().max(1.0) as u32
}

/// Progress snapshot returned from every successful vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteTally {
    pub request_id: String,
    pub status: RequestStatus,
    pub vote_count: u32,
    pub approve_count: u32,
    pub reject_count: u32,
    pub required_approvals: u32,
    pub total_admins: u32,
}

/// Creates update requests and drives them through voting
pub struct VotingEngine {
    limiter: Arc<RateLimiter>,
    store: Arc<RequestStore>,
    queue: Arc<RequestQueue>,
    authority: Arc<dyn AuthorityProvider>,
    config: VotingConfig,

    /// Pacific calendar date the platform-wide democratic update was last used
    democratic_used_on: RwLock<Option<NaiveDate>>,
}

impl VotingEngine {
    /// Create a new engine over the shared stores
    pub fn new(
        limiter: Arc<RateLimiter>,
        store: Arc<RequestStore>,
        queue: Arc<RequestQueue>,
        authority: Arc<dyn AuthorityProvider>,
        config: VotingConfig,
    ) -> Self {
        Self {
            limiter,
            store,
            queue,
            authority,
            config,
            democratic_used_on: RwLock::new(None),
        }
    }

    fn expiration(&self) -> Duration {
        Duration::minutes(self.config.request_expiration_minutes as i64)
    }

    /// Submit a refresh request
    ///
    /// Owners skip voting: the request comes back `Approved` and is already
    /// queued. Admins get a `Pending` request that must collect votes, and
    /// additionally consume the platform-wide once-per-day democratic slot.
    pub async fn create_request(
        &self,
        requester_id: &str,
        requester_name: &str,
        now: DateTime<Utc>,
    ) -> VotingResult<UpdateRequest> {
        let authority = self.authority.get_authority(requester_id).await;
        if !authority.is_admin {
            return Err(VotingError::not_authorized(requester_id));
        }

        self.limiter.check_request(requester_id, now).await?;

        if authority.is_owner {
            let mut request = UpdateRequest::new(
                requester_id,
                requester_name,
                RequestType::ForceUpdate,
                now,
                self.expiration(),
            );
            request.mark_owner_approved(requester_id, now);

            if !self.queue.enqueue(request.clone(), now).await {
                warn!(requester_id, "owner request rejected: queue at capacity");
                return Err(VotingError::QueueFull {
                    capacity: self.queue.capacity(),
                });
            }
            self.limiter.record_request(requester_id, now).await?;

            info!(
                request_id = %request.id,
                requester_id,
                "owner request approved and queued"
            );
            return Ok(request);
        }

        // Hold the flag lock across check-and-set so two admins racing for
        // the daily democratic slot cannot both win it.
        let today = clock::local_date(now);
        let mut used_on = self.democratic_used_on.write().await;
        if *used_on == Some(today) {
            return Err(VotingError::DemocraticUpdateUsed { date: today });
        }

        let request = UpdateRequest::new(
            requester_id,
            requester_name,
            RequestType::DemocraticUpdate,
            now,
            self.expiration(),
        );
        self.store.insert_update(request.clone()).await;
        self.limiter.record_request(requester_id, now).await?;
        *used_on = Some(today);

        info!(
            request_id = %request.id,
            requester_id,
            expires_at = %request.expires_at,
            "democratic update request created, awaiting votes"
        );
        Ok(request)
    }

    /// Cast one admin's vote and report the tally
    ///
    /// When approvals reach the threshold the request is enqueued for
    /// execution and leaves the pending store. If the queue is full at that
    /// moment the request stays pending with its votes intact and the caller
    /// sees the capacity error.
    pub async fn vote(
        &self,
        request_id: &str,
        admin_id: &str,
        choice: VoteChoice,
        now: DateTime<Utc>,
    ) -> VotingResult<VoteTally> {
        let authority = self.authority.get_authority(admin_id).await;
        if !authority.is_admin {
            return Err(VotingError::not_authorized(admin_id));
        }
        self.limiter.validate_admin_id(admin_id)?;

        let total_admins = self.authority.admin_count().await;
        let required = required_approvals(total_admins, self.config.approval_ratio);

        let snapshot = self
            .store
            .apply_vote(request_id, admin_id, choice, now)
            .await?;

        let mut status = snapshot.status;
        if snapshot.approve_count >= required {
            let mut approved = snapshot.clone();
            approved.status = RequestStatus::Approved;

            if !self.queue.enqueue(approved, now).await {
                warn!(
                    request_id,
                    "approval threshold reached but queue is full; request stays pending"
                );
                return Err(VotingError::QueueFull {
                    capacity: self.queue.capacity(),
                });
            }
            self.store.approve_and_remove(request_id).await;
            status = RequestStatus::Approved;

            info!(
                request_id,
                approve_count = snapshot.approve_count,
                required,
                "democratic request approved and queued"
            );
        }

        Ok(VoteTally {
            request_id: request_id.to_string(),
            status,
            vote_count: snapshot.vote_count,
            approve_count: snapshot.approve_count,
            reject_count: snapshot.reject_count,
            required_approvals: required,
            total_admins,
        })
    }

    /// Current tally for a request without casting a vote
    pub async fn tally(&self, request_id: &str, now: DateTime<Utc>) -> VotingResult<VoteTally> {
        let total_admins = self.authority.admin_count().await;
        let required = required_approvals(total_admins, self.config.approval_ratio);

        let request = self
            .store
            .get_update(request_id, now)
            .await
            .ok_or_else(|| crate::store::StoreError::UpdateNotFound {
                id: request_id.to_string(),
            })?;

        Ok(VoteTally {
            request_id: request.id,
            status: request.status,
            vote_count: request.vote_count,
            approve_count: request.approve_count,
            reject_count: request.reject_count,
            required_approvals: required,
            total_admins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::StaticAuthority;
    use crate::config::{QueueConfig, SecurityConfig};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap()
    }

    fn engine_with(capacity: usize, admins: u32) -> (VotingEngine, Arc<RequestQueue>) {
        let mut authority = StaticAuthority::new().with_owner("owner-1");
        for i in 1..admins {
            authority = authority.with_admin(format!("admin-{i}"));
        }
        let queue = Arc::new(RequestQueue::new(QueueConfig { capacity }));
        let engine = VotingEngine::new(
            Arc::new(RateLimiter::new(SecurityConfig::default())),
            Arc::new(RequestStore::new()),
            Arc::clone(&queue),
            Arc::new(authority),
            VotingConfig::default(),
        );
        (engine, queue)
    }

    #[test]
    fn test_required_approvals_rounding() {
        assert_eq!(required_approvals(4, 0.75), 3);
        assert_eq!(required_approvals(5, 0.75), 4);
        assert_eq!(required_approvals(3, 0.75), 3);
        assert_eq!(required_approvals(1, 0.75), 1);
        assert_eq!(required_approvals(0, 0.75), 1);
    }

    #[tokio::test]
    async fn test_owner_fast_path_bypasses_voting() {
        let (engine, queue) = engine_with(10, 4);

        let request = engine.create_request("owner-1", "Olga", t0()).await.unwrap();
        assert_eq!(request.status, RequestStatus::Approved);
        assert_eq!(request.request_type, RequestType::ForceUpdate);
        assert!(request.votes.is_empty());
        assert_eq!(request.owner_approved_by.as_deref(), Some("owner-1"));

        let queued = queue.snapshot().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].request_type, RequestType::ForceUpdate);
    }

    #[tokio::test]
    async fn test_non_admin_rejected() {
        let (engine, _) = engine_with(10, 4);
        let err = engine
            .create_request("stranger", "Sam", t0())
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::NotAuthorized { .. }));
    }

    #[tokio::test]
    async fn test_democratic_slot_used_once_per_day() {
        let (engine, _) = engine_with(10, 4);

        engine.create_request("admin-1", "Alice", t0()).await.unwrap();
        let err = engine
            .create_request("admin-2", "Bob", t0())
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::DemocraticUpdateUsed { .. }));

        // The slot frees up on the next Pacific calendar day
        let tomorrow = clock::next_midnight(t0()) + Duration::seconds(1);
        assert!(engine
            .create_request("admin-2", "Bob", tomorrow)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_rate_limiter_gates_creation() {
        let (engine, _) = engine_with(10, 4);

        engine.create_request("admin-1", "Alice", t0()).await.unwrap();

        // A new day frees both the per-admin quota and the democratic slot
        let next_day = clock::next_midnight(t0()) + Duration::seconds(1);
        engine
            .create_request("admin-1", "Alice", next_day)
            .await
            .unwrap();

        let err = engine
            .create_request("admin-1", "Alice", next_day + Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::Security(_)));
    }

    #[tokio::test]
    async fn test_vote_threshold_four_admins() {
        let (engine, queue) = engine_with(10, 4);

        let request = engine.create_request("admin-1", "Alice", t0()).await.unwrap();

        let tally = engine
            .vote(&request.id, "admin-2", VoteChoice::Approve, t0())
            .await
            .unwrap();
        assert_eq!(tally.status, RequestStatus::Pending);
        assert_eq!(tally.required_approvals, 3);

        let tally = engine
            .vote(&request.id, "admin-3", VoteChoice::Approve, t0())
            .await
            .unwrap();
        assert_eq!(tally.status, RequestStatus::Pending);
        assert_eq!(tally.approve_count, 2);
        assert!(queue.snapshot().await.is_empty());

        let tally = engine
            .vote(&request.id, "owner-1", VoteChoice::Approve, t0())
            .await
            .unwrap();
        assert_eq!(tally.status, RequestStatus::Approved);
        assert_eq!(tally.approve_count, 3);

        let queued = queue.snapshot().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].request_type, RequestType::DemocraticUpdate);
    }

    #[tokio::test]
    async fn test_reject_votes_never_terminate() {
        let (engine, _) = engine_with(10, 4);
        let request = engine.create_request("admin-1", "Alice", t0()).await.unwrap();

        for admin in ["admin-2", "admin-3", "owner-1"] {
            let tally = engine
                .vote(&request.id, admin, VoteChoice::Reject, t0())
                .await
                .unwrap();
            assert_eq!(tally.status, RequestStatus::Pending);
        }

        let tally = engine.tally(&request.id, t0()).await.unwrap();
        assert_eq!(tally.reject_count, 3);
        assert_eq!(tally.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_queue_full_keeps_request_pending() {
        let (engine, queue) = engine_with(1, 4);

        // Fill the single slot with an owner request
        engine.create_request("owner-1", "Olga", t0()).await.unwrap();
        assert_eq!(queue.len().await, 1);

        // Democratic slot: created the same day is fine, limiter tracks per admin
        let request = engine.create_request("admin-1", "Alice", t0()).await.unwrap();
        engine
            .vote(&request.id, "admin-2", VoteChoice::Approve, t0())
            .await
            .unwrap();
        engine
            .vote(&request.id, "admin-3", VoteChoice::Approve, t0())
            .await
            .unwrap();

        let err = engine
            .vote(&request.id, "owner-1", VoteChoice::Approve, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::QueueFull { .. }));

        // Votes survived; the request is still pending
        let tally = engine.tally(&request.id, t0()).await.unwrap();
        assert_eq!(tally.status, RequestStatus::Pending);
        assert_eq!(tally.approve_count, 3);
    }

    #[tokio::test]
    async fn test_vote_tally_invariant_holds() {
        let (engine, _) = engine_with(10, 6);
        let request = engine.create_request("admin-1", "Alice", t0()).await.unwrap();

        let choices = [
            ("admin-2", VoteChoice::Approve),
            ("admin-3", VoteChoice::Reject),
            ("admin-4", VoteChoice::Approve),
        ];
        for (admin, choice) in choices {
            let tally = engine.vote(&request.id, admin, choice, t0()).await.unwrap();
            assert_eq!(tally.vote_count, tally.approve_count + tally.reject_count);
        }
    }
}
