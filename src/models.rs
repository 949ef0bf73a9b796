// Core data structures for the updraft governance core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle state of an update request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl RequestStatus {
    /// Terminal states accept no further transitions or votes
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an update request was (or will be) authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Owner-submitted, bypasses voting entirely
    ForceUpdate,
    /// Approved by admin majority vote
    DemocraticUpdate,
}

impl RequestType {
    /// Queue priority; owner requests outrank democratic ones
    pub fn priority(&self) -> u8 {
        match self {
            Self::ForceUpdate => 2,
            Self::DemocraticUpdate => 1,
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ForceUpdate => "force_update",
            Self::DemocraticUpdate => "democratic_update",
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single admin's vote on an update request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Approve,
    Reject,
}

/// A request to run the privileged full data refresh
///
/// Counters are denormalized from `votes` and kept consistent by
/// [`UpdateRequest::cast_vote`]; status only ever moves forward from
/// `Pending` into one of the terminal states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Opaque unique id
    pub id: String,

    /// Admin who submitted the request
    pub requester_id: String,

    /// Display name of the requester
    pub requester_name: String,

    pub created_at: DateTime<Utc>,

    /// Fixed at creation, never extended
    pub expires_at: DateTime<Utc>,

    pub status: RequestStatus,

    pub request_type: RequestType,

    /// One vote per admin id
    pub votes: HashMap<String, VoteChoice>,

    pub vote_count: u32,
    pub approve_count: u32,
    pub reject_count: u32,

    /// Set only on the owner fast path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_approved_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_approved_at: Option<DateTime<Utc>>,
}

impl UpdateRequest {
    /// Create a new pending request expiring after `expiration`
    pub fn new(
        requester_id: impl Into<String>,
        requester_name: impl Into<String>,
        request_type: RequestType,
        created_at: DateTime<Utc>,
        expiration: chrono::Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            requester_id: requester_id.into(),
            requester_name: requester_name.into(),
            created_at,
            expires_at: created_at + expiration,
            status: RequestStatus::Pending,
            request_type,
            votes: HashMap::new(),
            vote_count: 0,
            approve_count: 0,
            reject_count: 0,
            owner_approved_by: None,
            owner_approved_at: None,
        }
    }

    /// Check whether the request has passed its expiration instant
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Record a vote, updating the denormalized counters
    ///
    /// Returns `false` without mutating anything if the admin already voted.
    pub fn cast_vote(&mut self, admin_id: impl Into<String>, choice: VoteChoice) -> bool {
        let admin_id = admin_id.into();
        if self.votes.contains_key(&admin_id) {
            return false;
        }
        self.votes.insert(admin_id, choice);
        self.vote_count += 1;
        match choice {
            VoteChoice::Approve => self.approve_count += 1,
            VoteChoice::Reject => self.reject_count += 1,
        }
        true
    }

    /// Stamp the owner fast-path approval fields
    pub fn mark_owner_approved(&mut self, owner_id: impl Into<String>, at: DateTime<Utc>) {
        self.status = RequestStatus::Approved;
        self.owner_approved_by = Some(owner_id.into());
        self.owner_approved_at = Some(at);
    }
}

/// Lifecycle state of a product submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Pending,
    QueuedForInsertion,
    Rejected,
    Approved,
}

impl ProductStatus {
    /// A single admin decision has already been taken
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::QueuedForInsertion => "queued_for_insertion",
            Self::Rejected => "rejected",
            Self::Approved => "approved",
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single admin's decision on a product submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// A submitted product awaiting a single-admin decision
///
/// Duplicate verification happens before one of these is created; the payload
/// is opaque to this core and passed through to the datastore unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRequest {
    pub id: String,

    pub requester_name: String,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    pub status: ProductStatus,

    /// Opaque payload handed to the datastore on insertion
    pub product_details: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_reviewed_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_reviewed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
}

impl ProductRequest {
    /// Create a new pending submission expiring after `pending_max_age`
    pub fn new(
        requester_name: impl Into<String>,
        product_details: serde_json::Value,
        created_at: DateTime<Utc>,
        pending_max_age: chrono::Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            requester_name: requester_name.into(),
            created_at,
            expires_at: created_at + pending_max_age,
            status: ProductStatus::Pending,
            product_details,
            admin_reviewed_by: None,
            admin_reviewed_at: None,
            review_notes: None,
        }
    }

    /// Whether the submission has sat pending longer than `max_age`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        self.status == ProductStatus::Pending && now - self.created_at > max_age
    }
}

/// An approved submission scheduled for the next daily insertion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedInsertion {
    pub id: String,

    /// The `ProductRequest` this insertion was derived from
    pub original_request_id: String,

    pub product_details: serde_json::Value,

    pub approved_by: String,

    pub approved_at: DateTime<Utc>,

    /// Next Pacific midnight strictly after approval
    pub scheduled_insertion_time: DateTime<Utc>,
}

impl QueuedInsertion {
    /// Derive an insertion entry from an approved product request
    pub fn from_request(
        request: &ProductRequest,
        approved_by: impl Into<String>,
        approved_at: DateTime<Utc>,
        scheduled_insertion_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            original_request_id: request.id.clone(),
            product_details: request.product_details.clone(),
            approved_by: approved_by.into(),
            approved_at,
            scheduled_insertion_time,
        }
    }
}
