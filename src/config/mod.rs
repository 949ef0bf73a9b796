//! Configuration management for the updraft governance core
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. Every knob has a default matching the platform's
//! production policy (10-minute request expiry, 2-hour refresh cooldown,
//! midnight maintenance hour), so an empty environment yields a working
//! configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rate limiter configuration
    pub security: SecurityConfig,

    /// Voting engine configuration
    pub voting: VotingConfig,

    /// Request queue configuration
    pub queue: QueueConfig,

    /// Queue processor configuration
    pub processor: ProcessorConfig,

    /// Insertion scheduler configuration
    pub insertion: InsertionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Rate limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Minutes before an active request stops blocking its admin
    pub request_expiration_minutes: u32,

    /// Requests each admin may make per Pacific day
    pub max_requests_per_day: u32,

    /// Require UUID v4 admin ids instead of the relaxed identifier class
    pub strict_admin_ids: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            request_expiration_minutes: 10,
            max_requests_per_day: 1,
            strict_admin_ids: false,
        }
    }
}

/// Voting engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Fraction of all admins whose approval passes a democratic request
    pub approval_ratio: f64,

    /// Minutes before a pending update request expires
    pub request_expiration_minutes: u32,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            approval_ratio: 0.75,
            request_expiration_minutes: 10,
        }
    }
}

/// Request queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum outstanding approved requests; beyond this the system is busy
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

/// Queue processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Poll interval while the queue has work (seconds)
    pub active_poll_secs: u64,

    /// Poll interval while the queue is empty (seconds)
    pub idle_poll_secs: u64,

    /// Minimum seconds between two full-refresh executions
    pub cooldown_secs: i64,

    /// Pacific hour of the daily maintenance instant
    pub maintenance_hour: u32,

    /// Hours on each side of the maintenance hour where execution is refused
    pub blackout_radius_hours: u32,

    /// Execution history entries retained (oldest evicted first)
    pub history_limit: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            active_poll_secs: 1,
            idle_poll_secs: 5,
            cooldown_secs: 2 * 60 * 60,
            maintenance_hour: 0,
            blackout_radius_hours: 1,
            history_limit: 100,
        }
    }
}

/// Insertion scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertionConfig {
    /// Days a submission may sit pending before the sweep deletes it
    pub pending_max_age_days: i64,

    /// Datastore write retries per item within a single run
    pub insert_max_retries: u32,

    /// Base delay for insertion retry backoff (milliseconds)
    pub insert_retry_base_delay_ms: u64,

    /// Failed items retained on the needs-attention list
    pub needs_attention_limit: usize,
}

impl Default for InsertionConfig {
    fn default() -> Self {
        Self {
            pending_max_age_days: 3,
            insert_max_retries: 2,
            insert_retry_base_delay_ms: 500,
            needs_attention_limit: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<u32>("UPDRAFT_REQUEST_EXPIRATION_MINUTES") {
            config.security.request_expiration_minutes = v;
            config.voting.request_expiration_minutes = v;
        }
        if let Some(v) = env_parse::<u32>("UPDRAFT_MAX_REQUESTS_PER_DAY") {
            config.security.max_requests_per_day = v;
        }
        if let Some(v) = env_parse::<bool>("UPDRAFT_STRICT_ADMIN_IDS") {
            config.security.strict_admin_ids = v;
        }
        if let Some(v) = env_parse::<f64>("UPDRAFT_APPROVAL_RATIO") {
            config.voting.approval_ratio = v;
        }
        if let Some(v) = env_parse::<usize>("UPDRAFT_QUEUE_CAPACITY") {
            config.queue.capacity = v;
        }
        if let Some(v) = env_parse::<u64>("UPDRAFT_ACTIVE_POLL_SECS") {
            config.processor.active_poll_secs = v;
        }
        if let Some(v) = env_parse::<u64>("UPDRAFT_IDLE_POLL_SECS") {
            config.processor.idle_poll_secs = v;
        }
        if let Some(v) = env_parse::<i64>("UPDRAFT_COOLDOWN_SECS") {
            config.processor.cooldown_secs = v;
        }
        if let Some(v) = env_parse::<u32>("UPDRAFT_MAINTENANCE_HOUR") {
            config.processor.maintenance_hour = v;
        }
        if let Some(v) = env_parse::<u32>("UPDRAFT_BLACKOUT_RADIUS_HOURS") {
            config.processor.blackout_radius_hours = v;
        }
        if let Some(v) = env_parse::<i64>("UPDRAFT_PENDING_MAX_AGE_DAYS") {
            config.insertion.pending_max_age_days = v;
        }
        if let Ok(v) = std::env::var("UPDRAFT_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("UPDRAFT_LOG_FORMAT") {
            config.logging.format = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.security.request_expiration_minutes == 0 {
            anyhow::bail!("security.request_expiration_minutes must be positive");
        }
        if self.security.max_requests_per_day == 0 {
            anyhow::bail!("security.max_requests_per_day must be positive");
        }
        if !(self.voting.approval_ratio > 0.0 && self.voting.approval_ratio <= 1.0) {
            anyhow::bail!(
                "voting.approval_ratio must be in (0, 1], got {}",
                self.voting.approval_ratio
            );
        }
        if self.voting.request_expiration_minutes == 0 {
            anyhow::bail!("voting.request_expiration_minutes must be positive");
        }
        if self.queue.capacity == 0 {
            anyhow::bail!("queue.capacity must be positive");
        }
        if self.processor.active_poll_secs == 0 || self.processor.idle_poll_secs == 0 {
            anyhow::bail!("processor poll intervals must be positive");
        }
        if self.processor.cooldown_secs < 0 {
            anyhow::bail!("processor.cooldown_secs must not be negative");
        }
        if self.processor.maintenance_hour > 23 {
            anyhow::bail!(
                "processor.maintenance_hour must be 0-23, got {}",
                self.processor.maintenance_hour
            );
        }
        if self.processor.blackout_radius_hours > 11 {
            anyhow::bail!("processor.blackout_radius_hours must be 0-11");
        }
        if self.insertion.pending_max_age_days <= 0 {
            anyhow::bail!("insertion.pending_max_age_days must be positive");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
