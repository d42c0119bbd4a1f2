//! Per-run report lines produced by a reconciliation batch.

use crate::usage::UsageAggregate;
use crate::verify::{SkipReason, VerificationStatus};
use serde::Serialize;
use std::fmt;

/// What happened to one run in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportOutcome {
    /// The usage API was queried and the reading applied
    Polled {
        stable_count: u32,
        newly_verified: bool,
    },
    /// Left alone in this invocation
    Skipped { reason: SkipReason },
    /// The run itself did not complete
    MarkedFailed,
    /// Exceeded the maximum age without verifying
    MarkedStale,
    /// The fetch or the document failed; the run keeps its prior state
    Error { transient: bool },
}

/// One human-readable line of a batch report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    /// Status after this invocation; absent when the document couldn't be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VerificationStatus>,
    pub outcome: ReportOutcome,
    /// The reading taken in this invocation, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<UsageAggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReconciliationReport {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ReportOutcome::Error { .. })
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.run_id)?;
        if let Some(framework) = &self.framework {
            write!(f, " [{}]", framework)?;
        }
        match self.status {
            Some(status) => write!(f, " {}", status)?,
            None => write!(f, " unreadable")?,
        }

        match &self.outcome {
            ReportOutcome::Polled {
                stable_count,
                newly_verified,
            } => {
                if let Some(totals) = &self.totals {
                    write!(f, ": {}", totals)?;
                }
                write!(f, " (stable x{}", stable_count)?;
                if *newly_verified {
                    write!(f, ", newly verified")?;
                }
                write!(f, ")")?;
            }
            ReportOutcome::Skipped { reason } => write!(f, ": skipped, {}", reason.describe())?,
            ReportOutcome::MarkedFailed => write!(f, ": run failed, not reconciled")?,
            ReportOutcome::MarkedStale => write!(f, ": gave up, never stabilized")?,
            ReportOutcome::Error { transient } => {
                let kind = if *transient { "transient error" } else { "error" };
                write!(f, ": {}", kind)?;
            }
        }

        if let Some(message) = &self.message {
            write!(f, " - {}", message)?;
        }
        Ok(())
    }
}

/// Counts over a batch, for the closing summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub polled: usize,
    pub verified: usize,
    pub warnings: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[ReconciliationReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.outcome {
                ReportOutcome::Polled { .. } => summary.polled += 1,
                ReportOutcome::Skipped { .. } => summary.skipped += 1,
                ReportOutcome::Error { .. } => summary.errors += 1,
                ReportOutcome::MarkedFailed | ReportOutcome::MarkedStale => {}
            }
            match report.status {
                Some(VerificationStatus::Verified) => summary.verified += 1,
                Some(VerificationStatus::Warning) => summary.warnings += 1,
                _ => {}
            }
        }
        summary
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} polled, {} verified, {} warning, {} skipped, {} errors",
            self.polled, self.verified, self.warnings, self.skipped, self.errors
        )
    }
}
