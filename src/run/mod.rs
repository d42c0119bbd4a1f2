//! Run records.
//!
//! A run record is the per-run metrics document written by the benchmark
//! orchestrator. The reconciler only ever appends attempts, updates the
//! verification status and sets `aggregate_totals`; timestamps and step
//! timings belong to the orchestrator and are never rewritten.

mod error;
mod store;

pub use error::StoreError;
pub use store::RunStore;

use crate::usage::UsageAggregate;
use crate::verify::ReconciliationRecord;
use serde::{Deserialize, Serialize};

/// How the benchmarked run itself ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    #[default]
    Completed,
    Failed,
}

/// Timing for one step/sprint of a run.
///
/// Steps never carry token or cost fields: usage is only attributable at the
/// run level, so unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepTiming {
    pub name: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
}

/// Verified usage totals for a run, with cost when pricing is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    #[serde(flatten)]
    pub usage: UsageAggregate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

/// The persisted per-run document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub framework: String,
    /// Unix seconds, captured around the framework's actual work
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    #[serde(default)]
    pub outcome: RunOutcome,
    #[serde(default)]
    pub steps: Vec<StepTiming>,
    /// Present only while the run is verified
    #[serde(default)]
    pub aggregate_totals: Option<RunTotals>,
    #[serde(default)]
    pub reconciliation: ReconciliationRecord,
    /// Orchestrator fields this crate doesn't model, written back untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RunRecord {
    pub fn new(
        run_id: impl Into<String>,
        framework: impl Into<String>,
        start_timestamp: i64,
        end_timestamp: i64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            framework: framework.into(),
            start_timestamp,
            end_timestamp,
            outcome: RunOutcome::Completed,
            steps: Vec::new(),
            aggregate_totals: None,
            reconciliation: ReconciliationRecord::default(),
            extra: serde_json::Map::new(),
        }
    }

    /// Seconds since the run finished.
    pub fn age_secs(&self, now: i64) -> i64 {
        now - self.end_timestamp
    }

    /// Check the document's structural invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.run_id.trim().is_empty() {
            return Err("run_id cannot be empty".to_string());
        }
        if self.run_id.contains(['/', '\\']) || self.run_id == "." || self.run_id == ".." {
            return Err(format!("run_id '{}' is not a valid directory name", self.run_id));
        }
        if self.framework.trim().is_empty() {
            return Err("framework cannot be empty".to_string());
        }
        if self.start_timestamp >= self.end_timestamp {
            return Err(format!(
                "start_timestamp ({}) must be before end_timestamp ({})",
                self.start_timestamp, self.end_timestamp
            ));
        }
        for step in &self.steps {
            if step.start_timestamp > step.end_timestamp {
                return Err(format!("step '{}' ends before it starts", step.name));
            }
        }
        if let Some(totals) = &self.aggregate_totals {
            totals.usage.validate()?;
        }
        for attempt in &self.reconciliation.attempts {
            if let Some(aggregate) = &attempt.aggregate {
                aggregate.validate()?;
            }
        }
        Ok(())
    }
}
