//! Execution timing policy
//!
//! Two independent rules decide whether a refresh may run right now: a
//! cooldown since the last successful execution, and a blackout window
//! around the daily maintenance hour. Both are advisory while a request
//! waits in the queue and enforced at execution time, so an approved request
//! can sit through a blackout window and run once it passes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProcessorConfig;
use crate::security::clock;

/// Why execution was refused at this instant
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyViolation {
    /// The previous refresh was too recent
    #[error("refresh cooldown active; retry in {remaining_minutes} minutes")]
    CooldownActive { remaining_minutes: i64 },

    /// The current Pacific hour is too close to the maintenance instant
    #[error(
        "inside the maintenance blackout window (hour {local_hour} is within {radius_hours}h of {maintenance_hour:02}:00 Pacific)"
    )]
    BlackoutWindow {
        local_hour: u32,
        maintenance_hour: u32,
        radius_hours: u32,
    },
}

/// Evaluates the cooldown and blackout rules
#[derive(Debug, Clone)]
pub struct TimePolicy {
    cooldown: Duration,
    maintenance_hour: u32,
    blackout_radius_hours: u32,
}

impl TimePolicy {
    /// Build the policy from processor configuration
    pub fn new(config: &ProcessorConfig) -> Self {
        Self {
            cooldown: Duration::seconds(config.cooldown_secs),
            maintenance_hour: config.maintenance_hour,
            blackout_radius_hours: config.blackout_radius_hours,
        }
    }

    /// May a refresh execute at `now`, given the last successful execution?
    ///
    /// Cooldown is checked first; exactly `cooldown` elapsed is allowed.
    pub fn check(
        &self,
        now: DateTime<Utc>,
        last_execution: Option<DateTime<Utc>>,
    ) -> Result<(), PolicyViolation> {
        if let Some(last) = last_execution {
            let elapsed = now - last;
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                // Round up so "retry in 0 minutes" never shows while blocked
                let remaining_minutes = (remaining.num_seconds() + 59) / 60;
                return Err(PolicyViolation::CooldownActive { remaining_minutes });
            }
        }

        let local_hour = clock::local_hour(now);
        if self.in_blackout(local_hour) {
            return Err(PolicyViolation::BlackoutWindow {
                local_hour,
                maintenance_hour: self.maintenance_hour,
                radius_hours: self.blackout_radius_hours,
            });
        }

        Ok(())
    }

    /// Whether a Pacific hour falls inside the blackout window
    ///
    /// Distance is circular over the 24-hour clock, so a midnight
    /// maintenance hour blacks out 23:00 through 01:59.
    fn in_blackout(&self, local_hour: u32) -> bool {
        let forward = (24 + local_hour - self.maintenance_hour) % 24;
        let backward = (24 + self.maintenance_hour - local_hour) % 24;
        forward.min(backward) <= self.blackout_radius_hours
    }
}
