//! Per-run reconciliation state and attempt history.

use crate::usage::UsageAggregate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verification status of a run's usage totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Not yet polled, or polled but not yet confirmed
    #[default]
    Pending,
    /// The API returned an empty report; presumably queried too early
    DataNotAvailable,
    /// Two consecutive readings disagreed; needs attention
    Warning,
    /// Enough consecutive readings agreed exactly
    Verified,
    /// The run itself did not complete; never reconciled
    Failed,
    /// Exceeded the maximum age without verifying; left for manual inspection
    Stale,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::DataNotAvailable => "data_not_available",
            VerificationStatus::Warning => "warning",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Failed => "failed",
            VerificationStatus::Stale => "stale",
        }
    }

    /// Statuses a scheduled batch never revisits on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Verified | VerificationStatus::Failed | VerificationStatus::Stale
        )
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(VerificationStatus::Pending),
            "data_not_available" => Ok(VerificationStatus::DataNotAvailable),
            "warning" => Ok(VerificationStatus::Warning),
            "verified" => Ok(VerificationStatus::Verified),
            "failed" => Ok(VerificationStatus::Failed),
            "stale" => Ok(VerificationStatus::Stale),
            _ => Err(format!("Invalid verification status: {}", s)),
        }
    }
}

/// One verification poll, kept forever for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationAttempt {
    /// Unix seconds when the poll ran
    pub timestamp: i64,
    /// Reading returned by the API; absent when the fetch failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<UsageAggregate>,
    /// Fetch error, when the poll failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Status after this attempt was applied
    pub status: VerificationStatus,
    /// Identical consecutive readings, including this one
    pub consecutive_stable_count: u32,
}

/// Outcome of applying one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    DataNotAvailable,
    Pending { count: u32 },
    /// `newly` is false when an already verified run was re-confirmed
    Verified { count: u32, newly: bool },
    Warning {
        previous: UsageAggregate,
        current: UsageAggregate,
    },
}

impl Transition {
    pub fn status(&self) -> VerificationStatus {
        match self {
            Transition::DataNotAvailable => VerificationStatus::DataNotAvailable,
            Transition::Pending { .. } => VerificationStatus::Pending,
            Transition::Verified { .. } => VerificationStatus::Verified,
            Transition::Warning { .. } => VerificationStatus::Warning,
        }
    }
}

/// The `reconciliation` sub-document of a run record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationRecord {
    pub status: VerificationStatus,
    pub consecutive_stable_count: u32,
    pub attempts: Vec<ReconciliationAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<i64>,
    /// Human-readable note about the latest transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReconciliationRecord {
    pub fn last_attempt(&self) -> Option<&ReconciliationAttempt> {
        self.attempts.last()
    }

    /// Most recent successful reading; failed fetches are skipped.
    pub fn last_reading(&self) -> Option<UsageAggregate> {
        self.attempts.iter().rev().find_map(|a| a.aggregate)
    }

    /// Whether a non-zero baseline exists to compare the next reading against.
    fn has_baseline(&self) -> bool {
        self.consecutive_stable_count > 0
            && matches!(
                self.status,
                VerificationStatus::Pending
                    | VerificationStatus::Warning
                    | VerificationStatus::Verified
                    | VerificationStatus::Stale
            )
    }

    /// Apply a reading and append it to the history.
    ///
    /// Stability is exact equality with the previous reading; any drift resets
    /// the count to 1 with the new reading as baseline. A zero reading never
    /// counts towards verification.
    pub fn apply_reading(
        &mut self,
        reading: UsageAggregate,
        now: i64,
        min_stable: u32,
    ) -> Transition {
        let transition = match self.last_reading() {
            Some(previous) if self.has_baseline() => {
                if previous == reading && !reading.is_zero() {
                    let count = self.consecutive_stable_count.saturating_add(1);
                    self.promote(count, now, min_stable)
                } else {
                    self.status = VerificationStatus::Warning;
                    self.consecutive_stable_count = 1;
                    self.verified_at = None;
                    self.message = Some(if previous == reading {
                        "usage API returned no data after a non-zero reading".to_string()
                    } else {
                        format!("usage changed: {} -> {}", previous, reading)
                    });
                    Transition::Warning {
                        previous,
                        current: reading,
                    }
                }
            }
            _ if reading.is_zero() => {
                self.status = VerificationStatus::DataNotAvailable;
                self.consecutive_stable_count = 0;
                self.message = Some("usage API returned no data for the run window".to_string());
                Transition::DataNotAvailable
            }
            _ => self.promote(1, now, min_stable),
        };

        self.attempts.push(ReconciliationAttempt {
            timestamp: now,
            aggregate: Some(reading),
            error: None,
            status: self.status,
            consecutive_stable_count: self.consecutive_stable_count,
        });

        transition
    }

    fn promote(&mut self, count: u32, now: i64, min_stable: u32) -> Transition {
        self.consecutive_stable_count = count;
        if count >= min_stable {
            let newly = self.status != VerificationStatus::Verified;
            self.status = VerificationStatus::Verified;
            if newly || self.verified_at.is_none() {
                self.verified_at = Some(now);
            }
            self.message = None;
            Transition::Verified { count, newly }
        } else {
            self.status = VerificationStatus::Pending;
            self.message = None;
            Transition::Pending { count }
        }
    }

    /// Record a failed fetch. Status and count are left as they were.
    pub fn record_failure(&mut self, error: String, now: i64) {
        self.message = Some(format!("last poll failed: {}", error));
        self.attempts.push(ReconciliationAttempt {
            timestamp: now,
            aggregate: None,
            error: Some(error),
            status: self.status,
            consecutive_stable_count: self.consecutive_stable_count,
        });
    }

    pub fn mark_failed(&mut self) {
        self.status = VerificationStatus::Failed;
        self.consecutive_stable_count = 0;
        self.verified_at = None;
        self.message = Some("run did not complete; reconciliation skipped".to_string());
    }

    pub fn mark_stale(&mut self, max_age_hours: u64) {
        let previous = self.status;
        self.status = VerificationStatus::Stale;
        self.message = Some(format!(
            "not verified within {}h (last status: {}); needs manual inspection",
            max_age_hours, previous
        ));
    }
}
