//! Source-of-truth store for update and product requests
//!
//! [`RequestStore`] exclusively owns the `UpdateRequest` and `ProductRequest`
//! entities. Other components hold copies derived from them and mutate the
//! originals only through the transition methods here, so status can only
//! move forward and counters never drift from the vote map.
//!
//! Expiration is lazy: any read that encounters a pending update request past
//! its expiry converts it to `Expired` on the spot. No background timer is
//! needed for correctness.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::{
    ProductRequest, ProductStatus, RequestStatus, ReviewDecision, UpdateRequest, VoteChoice,
};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level transition errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("update request '{id}' not found")]
    UpdateNotFound { id: String },

    #[error("product request '{id}' not found")]
    ProductNotFound { id: String },

    #[error("update request '{id}' is {status}, not pending")]
    RequestNotPending { id: String, status: RequestStatus },

    #[error("update request '{id}' has expired")]
    RequestExpired { id: String },

    #[error("admin '{admin_id}' already voted on request '{id}'")]
    DuplicateVote { id: String, admin_id: String },

    #[error("product request '{id}' was already processed ({status})")]
    AlreadyReviewed { id: String, status: ProductStatus },
}

/// In-memory store for pending governance entities
#[derive(Default)]
pub struct RequestStore {
    updates: RwLock<HashMap<String, UpdateRequest>>,
    products: RwLock<HashMap<String, ProductRequest>>,
}

impl RequestStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Update requests
    // ------------------------------------------------------------------

    /// Insert a freshly created update request
    pub async fn insert_update(&self, request: UpdateRequest) {
        let mut updates = self.updates.write().await;
        updates.insert(request.id.clone(), request);
    }

    /// Fetch an update request by id, lazily expiring it if stale
    pub async fn get_update(&self, id: &str, now: DateTime<Utc>) -> Option<UpdateRequest> {
        let mut updates = self.updates.write().await;
        let request = updates.get_mut(id)?;
        expire_if_stale(request, now);
        Some(request.clone())
    }

    /// All requests still pending at `now`
    ///
    /// Stale entries encountered along the way are converted to `Expired`
    /// and excluded from the result.
    pub async fn pending_updates(&self, now: DateTime<Utc>) -> Vec<UpdateRequest> {
        let mut updates = self.updates.write().await;
        updates
            .values_mut()
            .filter_map(|request| {
                expire_if_stale(request, now);
                (request.status == RequestStatus::Pending).then(|| request.clone())
            })
            .collect()
    }

    /// Apply one admin's vote and return the updated snapshot
    pub async fn apply_vote(
        &self,
        id: &str,
        admin_id: &str,
        choice: VoteChoice,
        now: DateTime<Utc>,
    ) -> StoreResult<UpdateRequest> {
        let mut updates = self.updates.write().await;
        let request = updates.get_mut(id).ok_or_else(|| StoreError::UpdateNotFound {
            id: id.to_string(),
        })?;

        if expire_if_stale(request, now) {
            return Err(StoreError::RequestExpired { id: id.to_string() });
        }
        if request.status != RequestStatus::Pending {
            return Err(StoreError::RequestNotPending {
                id: id.to_string(),
                status: request.status,
            });
        }
        if !request.cast_vote(admin_id, choice) {
            return Err(StoreError::DuplicateVote {
                id: id.to_string(),
                admin_id: admin_id.to_string(),
            });
        }

        debug!(
            request_id = id,
            admin_id,
            approve = request.approve_count,
            reject = request.reject_count,
            "vote recorded"
        );
        Ok(request.clone())
    }

    /// Finalize an approved request: mark it and remove it from the pending set
    pub async fn approve_and_remove(&self, id: &str) -> Option<UpdateRequest> {
        let mut updates = self.updates.write().await;
        let mut request = updates.remove(id)?;
        request.status = RequestStatus::Approved;
        info!(request_id = id, "update request approved and dequeued from store");
        Some(request)
    }

    /// Drop an update request outright (testing and administrative cleanup)
    pub async fn remove_update(&self, id: &str) -> Option<UpdateRequest> {
        self.updates.write().await.remove(id)
    }

    /// Convert every stale pending update to `Expired`, returning the count
    pub async fn expire_stale_updates(&self, now: DateTime<Utc>) -> usize {
        let mut updates = self.updates.write().await;
        let mut expired = 0;
        for request in updates.values_mut() {
            if request.status == RequestStatus::Pending && request.is_past_expiry(now) {
                request.status = RequestStatus::Expired;
                expired += 1;
            }
        }
        expired
    }

    // ------------------------------------------------------------------
    // Product requests
    // ------------------------------------------------------------------

    /// Insert a freshly submitted product request
    pub async fn insert_product(&self, request: ProductRequest) {
        let mut products = self.products.write().await;
        products.insert(request.id.clone(), request);
    }

    /// Fetch a product request by id
    pub async fn get_product(&self, id: &str) -> Option<ProductRequest> {
        self.products.read().await.get(id).cloned()
    }

    /// All product requests awaiting review
    pub async fn pending_products(&self) -> Vec<ProductRequest> {
        let products = self.products.read().await;
        products
            .values()
            .filter(|r| r.status == ProductStatus::Pending)
            .cloned()
            .collect()
    }

    /// Apply a single admin's review decision
    pub async fn decide_product(
        &self,
        id: &str,
        admin_id: &str,
        decision: ReviewDecision,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<ProductRequest> {
        let mut products = self.products.write().await;
        let request = products.get_mut(id).ok_or_else(|| StoreError::ProductNotFound {
            id: id.to_string(),
        })?;

        if request.status.is_decided() {
            return Err(StoreError::AlreadyReviewed {
                id: id.to_string(),
                status: request.status,
            });
        }

        request.status = match decision {
            ReviewDecision::Approve => ProductStatus::QueuedForInsertion,
            ReviewDecision::Reject => ProductStatus::Rejected,
        };
        request.admin_reviewed_by = Some(admin_id.to_string());
        request.admin_reviewed_at = Some(now);
        request.review_notes = notes;

        info!(
            product_request_id = id,
            admin_id,
            status = %request.status,
            "product request reviewed"
        );
        Ok(request.clone())
    }

    /// Record that a queued insertion reached the datastore
    pub async fn mark_product_inserted(&self, id: &str) -> bool {
        let mut products = self.products.write().await;
        match products.get_mut(id) {
            Some(request) if request.status == ProductStatus::QueuedForInsertion => {
                request.status = ProductStatus::Approved;
                true
            }
            _ => false,
        }
    }

    /// Delete pending product requests older than `max_age`
    pub async fn sweep_stale_products(
        &self,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Vec<ProductRequest> {
        let mut products = self.products.write().await;
        let stale_ids: Vec<String> = products
            .values()
            .filter(|r| r.is_stale(now, max_age))
            .map(|r| r.id.clone())
            .collect();

        stale_ids
            .iter()
            .filter_map(|id| products.remove(id))
            .collect()
    }

    /// Counts for the monitoring surface
    pub async fn counts(&self) -> (usize, usize) {
        let updates = self.updates.read().await.len();
        let products = self.products.read().await.len();
        (updates, products)
    }
}

/// Flip a stale pending request to `Expired`; true when a transition happened
/// or the request was already expired
fn expire_if_stale(request: &mut UpdateRequest, now: DateTime<Utc>) -> bool {
    if request.status == RequestStatus::Pending && request.is_past_expiry(now) {
        request.status = RequestStatus::Expired;
        debug!(request_id = %request.id, "pending request lazily expired");
        return true;
    }
    request.status == RequestStatus::Expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestType;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap()
    }

    fn pending_request() -> UpdateRequest {
        UpdateRequest::new(
            "admin-1",
            "Alice",
            RequestType::DemocraticUpdate,
            t0(),
            Duration::minutes(10),
        )
    }

    #[tokio::test]
    async fn test_vote_on_unknown_request() {
        let store = RequestStore::new();
        let err = store
            .apply_vote("missing", "admin-2", VoteChoice::Approve, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UpdateNotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_vote_rejected() {
        let store = RequestStore::new();
        let request = pending_request();
        let id = request.id.clone();
        store.insert_update(request).await;

        store
            .apply_vote(&id, "admin-2", VoteChoice::Approve, t0())
            .await
            .unwrap();
        let err = store
            .apply_vote(&id, "admin-2", VoteChoice::Reject, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateVote { .. }));

        // Counters unchanged by the rejected second vote
        let snapshot = store.get_update(&id, t0()).await.unwrap();
        assert_eq!(snapshot.vote_count, 1);
        assert_eq!(snapshot.approve_count, 1);
    }

    #[tokio::test]
    async fn test_lazy_expiration_on_vote() {
        let store = RequestStore::new();
        let request = pending_request();
        let id = request.id.clone();
        store.insert_update(request).await;

        let late = t0() + Duration::minutes(11);
        let err = store
            .apply_vote(&id, "admin-2", VoteChoice::Approve, late)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RequestExpired { .. }));

        let snapshot = store.get_update(&id, late).await.unwrap();
        assert_eq!(snapshot.status, RequestStatus::Expired);
    }

    #[tokio::test]
    async fn test_pending_updates_excludes_expired() {
        let store = RequestStore::new();
        store.insert_update(pending_request()).await;

        assert_eq!(store.pending_updates(t0()).await.len(), 1);
        assert_eq!(
            store
                .pending_updates(t0() + Duration::minutes(11))
                .await
                .len(),
            0
        );
    }

    #[tokio::test]
    async fn test_approve_and_remove() {
        let store = RequestStore::new();
        let request = pending_request();
        let id = request.id.clone();
        store.insert_update(request).await;

        let approved = store.approve_and_remove(&id).await.unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(store.get_update(&id, t0()).await.is_none());
    }

    #[tokio::test]
    async fn test_decide_product_once() {
        let store = RequestStore::new();
        let request = ProductRequest::new(
            "Bob",
            serde_json::json!({"name": "Widget"}),
            t0(),
            Duration::days(3),
        );
        let id = request.id.clone();
        store.insert_product(request).await;

        let reviewed = store
            .decide_product(&id, "admin-1", ReviewDecision::Approve, None, t0())
            .await
            .unwrap();
        assert_eq!(reviewed.status, ProductStatus::QueuedForInsertion);
        assert_eq!(reviewed.admin_reviewed_by.as_deref(), Some("admin-1"));

        let err = store
            .decide_product(&id, "admin-2", ReviewDecision::Reject, None, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyReviewed { .. }));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale_pending() {
        let store = RequestStore::new();
        let fresh = ProductRequest::new(
            "Bob",
            serde_json::json!({}),
            t0() - Duration::days(2),
            Duration::days(3),
        );
        let stale = ProductRequest::new(
            "Eve",
            serde_json::json!({}),
            t0() - Duration::days(4),
            Duration::days(3),
        );
        let stale_id = stale.id.clone();
        store.insert_product(fresh).await;
        store.insert_product(stale).await;

        let removed = store.sweep_stale_products(t0(), Duration::days(3)).await;
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, stale_id);
        assert_eq!(store.pending_products().await.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_product_inserted_requires_queued_status() {
        let store = RequestStore::new();
        let request = ProductRequest::new("Bob", serde_json::json!({}), t0(), Duration::days(3));
        let id = request.id.clone();
        store.insert_product(request).await;

        // Still pending, cannot jump straight to approved
        assert!(!store.mark_product_inserted(&id).await);

        store
            .decide_product(&id, "admin-1", ReviewDecision::Approve, None, t0())
            .await
            .unwrap();
        assert!(store.mark_product_inserted(&id).await);
        assert_eq!(
            store.get_product(&id).await.unwrap().status,
            ProductStatus::Approved
        );
    }
}
