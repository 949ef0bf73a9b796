//! In-memory per-admin request tracking
//!
//! Each admin gets one request per Pacific day, and may never hold two
//! active (non-expired) requests at once. All state is memory-resident; a
//! restart forgets daily counts and active flags.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::clock;
use super::error::{SecurityError, SecurityResult};
use crate::config::SecurityConfig;

/// Expiry check for a recorded request instant
///
/// Expired iff `now` is strictly past `request_time + expiration`; exactly
/// `expiration` elapsed is still live. Instants at or before the epoch are
/// treated as already expired.
pub fn is_request_expired(
    request_time: DateTime<Utc>,
    now: DateTime<Utc>,
    expiration: Duration,
) -> bool {
    if request_time.timestamp() <= 0 || now.timestamp() <= 0 {
        return true;
    }
    now > request_time + expiration
}

/// Per-admin tracking record
///
/// `requests_today` is only meaningful for the boundary stored in
/// `day_start_time`; the counter resets implicitly whenever the observed
/// boundary advances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminRecord {
    pub admin_id: String,
    pub requests_today: u32,
    pub last_request_time: Option<DateTime<Utc>>,
    pub day_start_time: Option<DateTime<Utc>>,
    pub has_active_request: bool,
}

/// Snapshot of a single admin's tracking state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStats {
    pub admin_id: String,
    pub requests_today: u32,
    pub last_request_time: Option<DateTime<Utc>>,
    pub has_active_request: bool,
}

/// Aggregate limiter snapshot for the monitoring surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityStats {
    pub total_requests_today: u32,
    pub tracked_admins: usize,
    pub active_requests: usize,
    pub admins: Vec<AdminStats>,
}

/// Tracks admin request quotas against the Pacific day boundary
pub struct RateLimiter {
    records: RwLock<HashMap<String, AdminRecord>>,
    config: SecurityConfig,
}

impl RateLimiter {
    /// Create a new limiter with the given configuration
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            config,
        }
    }

    fn expiration(&self) -> Duration {
        Duration::minutes(self.config.request_expiration_minutes as i64)
    }

    /// Gate check: may this admin submit a request right now?
    ///
    /// Expired active flags are purged first, so a request that timed out ten
    /// minutes ago never blocks its own admin.
    pub async fn check_request(&self, admin_id: &str, now: DateTime<Utc>) -> SecurityResult<()> {
        self.validate_admin_id(admin_id)?;
        self.cleanup_expired_requests(now).await;

        let records = self.records.read().await;
        let Some(record) = records.get(admin_id) else {
            return Ok(());
        };

        let boundary = clock::day_start(now);
        if record.day_start_time == Some(boundary)
            && record.requests_today >= self.config.max_requests_per_day
        {
            return Err(SecurityError::DailyLimitReached {
                admin_id: admin_id.to_string(),
            });
        }

        if record.has_active_request {
            if let Some(last) = record.last_request_time {
                if !is_request_expired(last, now, self.expiration()) {
                    let remaining = (last + self.expiration() - now).num_seconds().max(0);
                    return Err(SecurityError::ActiveRequestExists {
                        admin_id: admin_id.to_string(),
                        remaining_secs: remaining,
                    });
                }
            }
        }

        Ok(())
    }

    /// Boolean convenience wrapper around [`check_request`](Self::check_request)
    pub async fn can_make_request(&self, admin_id: &str, now: DateTime<Utc>) -> bool {
        self.check_request(admin_id, now).await.is_ok()
    }

    /// Record a request for the day containing `now`
    pub async fn record_request(&self, admin_id: &str, now: DateTime<Utc>) -> SecurityResult<()> {
        self.validate_admin_id(admin_id)?;

        let boundary = clock::day_start(now);
        let mut records = self.records.write().await;
        let record = records.entry(admin_id.to_string()).or_insert_with(|| {
            AdminRecord {
                admin_id: admin_id.to_string(),
                ..Default::default()
            }
        });

        if record.day_start_time != Some(boundary) {
            record.requests_today = 0;
            record.day_start_time = Some(boundary);
        }

        record.requests_today += 1;
        record.last_request_time = Some(now);
        record.has_active_request = true;

        debug!(
            admin_id,
            requests_today = record.requests_today,
            "recorded admin request"
        );
        Ok(())
    }

    /// Clear active flags for requests past their expiration window
    ///
    /// Daily counters are left untouched: expiry frees the overlap slot, not
    /// the quota.
    pub async fn cleanup_expired_requests(&self, now: DateTime<Utc>) -> usize {
        let expiration = self.expiration();
        let mut records = self.records.write().await;
        let mut cleared = 0;

        for record in records.values_mut() {
            if record.has_active_request
                && record
                    .last_request_time
                    .map_or(true, |last| is_request_expired(last, now, expiration))
            {
                record.has_active_request = false;
                cleared += 1;
            }
        }

        if cleared > 0 {
            debug!(cleared, "cleared expired active requests");
        }
        cleared
    }

    /// Has this admin a recorded request for the current day boundary?
    pub async fn has_admin_made_request_today(&self, admin_id: &str, now: DateTime<Utc>) -> bool {
        self.admin_request_count_today(admin_id, now).await > 0
    }

    /// Request count for the current day boundary (0 for unknown admins)
    pub async fn admin_request_count_today(&self, admin_id: &str, now: DateTime<Utc>) -> u32 {
        let boundary = clock::day_start(now);
        let records = self.records.read().await;
        records
            .get(admin_id)
            .filter(|r| r.day_start_time == Some(boundary))
            .map_or(0, |r| r.requests_today)
    }

    /// Sum of request counts across all admins for the current boundary
    pub async fn total_requests_today(&self, now: DateTime<Utc>) -> u32 {
        let boundary = clock::day_start(now);
        let records = self.records.read().await;
        records
            .values()
            .filter(|r| r.day_start_time == Some(boundary))
            .map(|r| r.requests_today)
            .sum()
    }

    /// Snapshot of every tracked admin
    pub async fn all_admin_stats(&self) -> Vec<AdminStats> {
        let records = self.records.read().await;
        records
            .values()
            .map(|r| AdminStats {
                admin_id: r.admin_id.clone(),
                requests_today: r.requests_today,
                last_request_time: r.last_request_time,
                has_active_request: r.has_active_request,
            })
            .collect()
    }

    /// Aggregate snapshot for the monitoring surface
    pub async fn stats(&self, now: DateTime<Utc>) -> SecurityStats {
        let total = self.total_requests_today(now).await;
        let records = self.records.read().await;
        let active = records.values().filter(|r| r.has_active_request).count();
        let admins = records
            .values()
            .map(|r| AdminStats {
                admin_id: r.admin_id.clone(),
                requests_today: r.requests_today,
                last_request_time: r.last_request_time,
                has_active_request: r.has_active_request,
            })
            .collect();

        SecurityStats {
            total_requests_today: total,
            tracked_admins: records.len(),
            active_requests: active,
            admins,
        }
    }

    /// Validate an admin identifier without touching limiter state
    ///
    /// Default mode accepts 1-100 chars of `[A-Za-z0-9_-]`; strict mode
    /// requires a UUID v4, matching the ids the identity provider issues.
    pub fn validate_admin_id(&self, admin_id: &str) -> SecurityResult<()> {
        if admin_id.is_empty() {
            return Err(SecurityError::invalid_admin_id("must not be empty"));
        }
        if admin_id.len() > 100 {
            return Err(SecurityError::invalid_admin_id(format!(
                "length {} exceeds 100",
                admin_id.len()
            )));
        }

        if self.config.strict_admin_ids {
            let parsed = Uuid::parse_str(admin_id)
                .map_err(|_| SecurityError::invalid_admin_id("expected a UUID v4"))?;
            if parsed.get_version_num() != 4 {
                return Err(SecurityError::invalid_admin_id("expected a UUID v4"));
            }
            return Ok(());
        }

        if !admin_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(SecurityError::invalid_admin_id(
                "only alphanumerics, '_' and '-' are allowed",
            ));
        }
        Ok(())
    }
}
