//! Gate between reconciliation and the statistical report pipeline.
//!
//! Only verified runs carry totals downstream. Everything else is listed as
//! excluded with its status, and logged, so a missing run is visible rather
//! than silently counted as zero.

use crate::run::RunRecord;
use crate::usage::UsageAggregate;
use crate::verify::VerificationStatus;
use serde::Serialize;

/// A run whose totals may be consumed by analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedRun {
    pub run_id: String,
    pub framework: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub duration_secs: i64,
    #[serde(flatten)]
    pub usage: UsageAggregate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    pub verified_at: Option<i64>,
}

/// A run kept out of analysis, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedRun {
    pub run_id: String,
    pub framework: String,
    pub status: VerificationStatus,
    pub reason: String,
}

/// Runs partitioned for the report pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisSet {
    pub verified: Vec<VerifiedRun>,
    pub excluded: Vec<ExcludedRun>,
}

impl AnalysisSet {
    /// Verified runs of one framework.
    pub fn for_framework<'a>(&'a self, framework: &'a str) -> impl Iterator<Item = &'a VerifiedRun> {
        self.verified.iter().filter(move |r| r.framework == framework)
    }
}

/// Partition run records into verified and excluded.
pub fn collect_verified<'a, I>(records: I) -> AnalysisSet
where
    I: IntoIterator<Item = &'a RunRecord>,
{
    let mut set = AnalysisSet::default();

    for record in records {
        let status = record.reconciliation.status;
        match (&record.aggregate_totals, status) {
            (Some(totals), VerificationStatus::Verified) => set.verified.push(VerifiedRun {
                run_id: record.run_id.clone(),
                framework: record.framework.clone(),
                start_timestamp: record.start_timestamp,
                end_timestamp: record.end_timestamp,
                duration_secs: record.end_timestamp - record.start_timestamp,
                usage: totals.usage,
                cost_usd: totals.cost_usd,
                verified_at: record.reconciliation.verified_at,
            }),
            (totals, _) => {
                let reason = if totals.is_none() && status == VerificationStatus::Verified {
                    "verified but no totals recorded".to_string()
                } else {
                    record
                        .reconciliation
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("status is {}", status))
                };
                tracing::warn!(
                    run_id = %record.run_id,
                    framework = %record.framework,
                    status = %status,
                    reason = %reason,
                    "Excluding unverified run from analysis"
                );
                set.excluded.push(ExcludedRun {
                    run_id: record.run_id.clone(),
                    framework: record.framework.clone(),
                    status,
                    reason,
                });
            }
        }
    }

    tracing::info!(
        verified = set.verified.len(),
        excluded = set.excluded.len(),
        "Collected runs for analysis"
    );
    set
}
