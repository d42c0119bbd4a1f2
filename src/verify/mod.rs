//! Stability verification.
//!
//! Decides when a run may be polled and promotes its totals through
//! `pending` -> `verified` only after enough identical, properly spaced
//! readings. Readings that drift move the run to `warning`; runs that never
//! settle within the maximum age become `stale`.

mod state;


pub use state::{ReconciliationAttempt, ReconciliationRecord, Transition, VerificationStatus};

use crate::config::{Pricing, VerificationConfig};
use crate::run::{RunOutcome, RunRecord, RunTotals};
use crate::usage::{UsageAggregate, UsageApiError};
use serde::Serialize;

/// Why a run was not polled in this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Verified, failed or stale
    Terminal,
    /// The run finished less than the minimum interval ago
    NotYetDue,
    /// The previous attempt was less than the minimum interval ago
    TooSoon,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::Terminal => "no further reconciliation needed",
            SkipReason::NotYetDue => "run finished too recently to poll",
            SkipReason::TooSoon => "previous poll too recent",
        }
    }
}

/// What to do with a run in this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    Poll,
    Skip(SkipReason),
    MarkFailed,
    MarkStale,
}

/// Flags that re-admit runs a scheduled batch would leave alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Re-poll verified runs to detect late corrections
    pub include_verified: bool,
    /// Retry stale runs, ignoring the maximum age
    pub include_stale: bool,
}

/// Drives the verification state machine for run records.
#[derive(Debug, Clone)]
pub struct StabilityVerifier {
    config: VerificationConfig,
}

impl StabilityVerifier {
    pub fn new(config: VerificationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Decide whether `record` should be polled at `now`.
    pub fn plan(&self, record: &RunRecord, now: i64, options: PlanOptions) -> PollDecision {
        let status = record.reconciliation.status;

        if record.outcome == RunOutcome::Failed {
            return if status == VerificationStatus::Failed {
                PollDecision::Skip(SkipReason::Terminal)
            } else {
                PollDecision::MarkFailed
            };
        }

        match status {
            VerificationStatus::Failed => return PollDecision::Skip(SkipReason::Terminal),
            VerificationStatus::Stale if !options.include_stale => {
                return PollDecision::Skip(SkipReason::Terminal)
            }
            VerificationStatus::Verified if !options.include_verified => {
                return PollDecision::Skip(SkipReason::Terminal)
            }
            _ => {}
        }

        let min_interval = self.config.min_interval_secs();
        let age = record.age_secs(now);
        if age < min_interval {
            return PollDecision::Skip(SkipReason::NotYetDue);
        }

        if !options.include_stale
            && status != VerificationStatus::Verified
            && age > self.config.max_age_secs()
        {
            return PollDecision::MarkStale;
        }

        if let Some(last) = record.reconciliation.last_attempt() {
            if now - last.timestamp < min_interval {
                return PollDecision::Skip(SkipReason::TooSoon);
            }
        }

        PollDecision::Poll
    }

    /// Apply a successful reading to the run and log the transition.
    ///
    /// `aggregate_totals` is set while the run is verified and cleared otherwise.
    pub fn apply_reading(
        &self,
        record: &mut RunRecord,
        reading: UsageAggregate,
        now: i64,
        pricing: Option<&Pricing>,
    ) -> Transition {
        let transition = record.reconciliation.apply_reading(
            reading,
            now,
            self.config.min_stable_verifications,
        );

        match transition {
            Transition::Verified { count, newly } => {
                record.aggregate_totals = Some(RunTotals {
                    usage: reading,
                    cost_usd: pricing.map(|p| {
                        p.cost_usd(reading.tokens_in, reading.tokens_out, reading.cached_tokens)
                    }),
                });
                tracing::info!(
                    run_id = %record.run_id,
                    framework = %record.framework,
                    stable_count = count,
                    newly_verified = newly,
                    tokens_in = reading.tokens_in,
                    tokens_out = reading.tokens_out,
                    cached_tokens = reading.cached_tokens,
                    api_calls = reading.api_calls,
                    "Run usage verified"
                );
            }
            Transition::Pending { count } => {
                record.aggregate_totals = None;
                tracing::info!(
                    run_id = %record.run_id,
                    framework = %record.framework,
                    stable_count = count,
                    required = self.config.min_stable_verifications,
                    tokens_in = reading.tokens_in,
                    tokens_out = reading.tokens_out,
                    "Run usage pending confirmation"
                );
            }
            Transition::DataNotAvailable => {
                record.aggregate_totals = None;
                tracing::info!(
                    run_id = %record.run_id,
                    framework = %record.framework,
                    "Usage data not yet available"
                );
            }
            Transition::Warning { previous, current } => {
                record.aggregate_totals = None;
                tracing::warn!(
                    run_id = %record.run_id,
                    framework = %record.framework,
                    previous = %previous,
                    current = %current,
                    "Run usage unstable between consecutive polls"
                );
            }
        }

        transition
    }

    /// Record a failed fetch; the run keeps its prior status.
    pub fn apply_failure(&self, record: &mut RunRecord, error: &UsageApiError, now: i64) {
        record.reconciliation.record_failure(error.to_string(), now);
        tracing::error!(
            run_id = %record.run_id,
            framework = %record.framework,
            status = %record.reconciliation.status,
            transient = error.is_transient(),
            error = %error,
            "Usage fetch failed"
        );
    }

    pub fn mark_failed(&self, record: &mut RunRecord) {
        record.reconciliation.mark_failed();
        record.aggregate_totals = None;
        tracing::info!(
            run_id = %record.run_id,
            framework = %record.framework,
            "Run did not complete, marked failed"
        );
    }

    pub fn mark_stale(&self, record: &mut RunRecord, now: i64) {
        record.reconciliation.mark_stale(self.config.max_age_hours);
        record.aggregate_totals = None;
        tracing::warn!(
            run_id = %record.run_id,
            framework = %record.framework,
            age_hours = record.age_secs(now) / 3600,
            attempts = record.reconciliation.attempts.len(),
            "Run never stabilized, marked stale"
        );
    }
}
