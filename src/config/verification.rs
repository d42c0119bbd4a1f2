//! Stability verification tunables

use serde::{Deserialize, Serialize};

/// Thresholds that drive the verification state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Consecutive identical readings required before a run is verified
    pub min_stable_verifications: u32,
    /// Minimum spacing between polls, and minimum run age before the first poll
    pub min_interval_minutes: u64,
    /// Runs older than this that never verified are given up on
    pub max_age_hours: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            min_stable_verifications: 2,
            min_interval_minutes: 5,
            max_age_hours: 24,
        }
    }
}

impl VerificationConfig {
    pub fn min_interval_secs(&self) -> i64 {
        (self.min_interval_minutes as i64).saturating_mul(60)
    }

    pub fn max_age_secs(&self) -> i64 {
        (self.max_age_hours as i64).saturating_mul(3600)
    }

    /// Validate configuration at startup
    pub fn validate(&self) -> Result<(), String> {
        if self.min_stable_verifications == 0 {
            return Err("min_stable_verifications must be >= 1".to_string());
        }
        if self.max_age_hours == 0 {
            return Err("max_age_hours must be > 0".to_string());
        }
        if self.min_interval_secs() >= self.max_age_secs() {
            return Err("min_interval_minutes must be shorter than max_age_hours".to_string());
        }
        Ok(())
    }
}
