//! Reconciliation scheduler.
//!
//! One call to [`Reconciler::reconcile_pending`] is one batch: it selects the
//! runs that need attention, queries the usage API for each in turn, applies
//! the reading through the stability verifier and persists the run record
//! before moving to the next run. Batches are meant to be invoked repeatedly
//! (cron, CI step) over hours or days.

mod error;
mod report;

pub use error::ReconcileError;
pub use report::{BatchSummary, ReconciliationReport, ReportOutcome};

use crate::config::{FrameworkConfig, ReconcilerConfig};
use crate::run::{RunRecord, RunStore};
use crate::usage::{UsageAggregate, UsageApiClient, UsageApiError, UsageSource, UsageWindow};
use crate::verify::{PlanOptions, PollDecision, SkipReason, StabilityVerifier, Transition};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Options for one reconciliation batch.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Unix seconds used as "now" for every age and interval check
    pub now: i64,
    /// Re-poll verified runs
    pub include_verified: bool,
    /// Retry runs already given up on as stale
    pub include_stale: bool,
    /// Stops the batch between runs, or abandons an in-flight fetch
    pub cancel: Option<CancellationToken>,
}

impl ReconcileOptions {
    /// Options with `now` set to the current wall-clock time.
    pub fn at_current_time() -> Self {
        Self {
            now: chrono::Utc::now().timestamp(),
            ..Default::default()
        }
    }

    fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            include_verified: self.include_verified,
            include_stale: self.include_stale,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

/// Runs reconciliation batches against a run store.
pub struct Reconciler {
    config: ReconcilerConfig,
    source: Arc<dyn UsageSource>,
    store: RunStore,
    verifier: StabilityVerifier,
}

impl Reconciler {
    /// Create a reconciler over an explicit usage source and store.
    ///
    /// The configuration is validated here, before any run is touched.
    pub fn new(
        config: ReconcilerConfig,
        source: Arc<dyn UsageSource>,
        store: RunStore,
    ) -> Result<Self, ReconcileError> {
        config.validate()?;
        let verifier = StabilityVerifier::new(config.verification);
        Ok(Self {
            config,
            source,
            store,
            verifier,
        })
    }

    /// Create a reconciler that queries the configured usage API.
    ///
    /// Fails if the admin credential is missing from the environment.
    pub fn from_config(config: ReconcilerConfig) -> Result<Self, ReconcileError> {
        config.validate()?;
        let admin_key = config.usage_api.resolve_admin_key()?;
        let client =
            UsageApiClient::new(&config.usage_api, admin_key).map_err(ReconcileError::Client)?;
        let store = RunStore::new(&config.store.runs_dir);
        Self::new(config, Arc::new(client), store)
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Reconcile every run that needs attention.
    ///
    /// Terminal runs are left out of the report. Unreadable documents and
    /// failed fetches become error lines; the batch continues past them.
    pub async fn reconcile_pending(
        &self,
        options: &ReconcileOptions,
    ) -> Result<Vec<ReconciliationReport>, ReconcileError> {
        let now = options.now;
        let plan_options = options.plan_options();
        let mut reports = Vec::new();
        let mut candidates: Vec<(RunRecord, PollDecision)> = Vec::new();

        for (run_id, loaded) in self.store.list()? {
            let record = match loaded {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(run_id = %run_id, error = %e, "Failed to load run record");
                    reports.push(ReconciliationReport {
                        run_id,
                        framework: None,
                        status: None,
                        outcome: ReportOutcome::Error { transient: false },
                        totals: None,
                        message: Some(e.to_string()),
                    });
                    continue;
                }
            };

            match self.verifier.plan(&record, now, plan_options) {
                PollDecision::Skip(SkipReason::Terminal) => {
                    tracing::trace!(
                        run_id = %record.run_id,
                        status = %record.reconciliation.status,
                        "Skipping terminal run"
                    );
                }
                PollDecision::Poll => {
                    // Unknown frameworks are fatal before anything is polled
                    self.config
                        .framework_for(&record.run_id, &record.framework)?;
                    candidates.push((record, PollDecision::Poll));
                }
                decision => candidates.push((record, decision)),
            }
        }

        tracing::info!(
            candidates = candidates.len(),
            unreadable = reports.len(),
            now = now,
            "Starting reconciliation batch"
        );

        let total = candidates.len();
        for (index, (mut record, decision)) in candidates.into_iter().enumerate() {
            if options.is_cancelled() {
                tracing::warn!(remaining = total - index, "Reconciliation cancelled");
                break;
            }

            let report = match decision {
                PollDecision::Poll => {
                    let framework = self
                        .config
                        .framework_for(&record.run_id, &record.framework)?;
                    match self.poll(&mut record, framework, options).await {
                        Some(report) => report,
                        None => {
                            tracing::warn!(
                                run_id = %record.run_id,
                                remaining = total - index,
                                "Reconciliation cancelled during fetch"
                            );
                            break;
                        }
                    }
                }
                PollDecision::MarkFailed => {
                    self.verifier.mark_failed(&mut record);
                    self.persist(&record, ReportOutcome::MarkedFailed, None)
                }
                PollDecision::MarkStale => {
                    self.verifier.mark_stale(&mut record, now);
                    self.persist(&record, ReportOutcome::MarkedStale, None)
                }
                PollDecision::Skip(reason) => {
                    tracing::debug!(
                        run_id = %record.run_id,
                        reason = reason.describe(),
                        "Skipping run"
                    );
                    report_for(&record, ReportOutcome::Skipped { reason }, None)
                }
            };
            reports.push(report);
        }

        tracing::info!(
            summary = %BatchSummary::from_reports(&reports),
            "Reconciliation batch finished"
        );
        Ok(reports)
    }

    /// Query, verify and persist one run. `None` if cancelled mid-fetch.
    async fn poll(
        &self,
        record: &mut RunRecord,
        framework: &FrameworkConfig,
        options: &ReconcileOptions,
    ) -> Option<ReconciliationReport> {
        let now = options.now;
        let fetched = match &options.cancel {
            Some(cancel) => tokio::select! {
                _ = cancel.cancelled() => return None,
                result = self.fetch(record, &framework.isolation_key) => result,
            },
            None => self.fetch(record, &framework.isolation_key).await,
        };

        match fetched {
            Ok(reading) => {
                let transition =
                    self.verifier
                        .apply_reading(record, reading, now, framework.pricing.as_ref());
                let (stable_count, newly_verified) = match transition {
                    Transition::Verified { count, newly } => (count, newly),
                    Transition::Pending { count } => (count, false),
                    Transition::Warning { .. } => (1, false),
                    Transition::DataNotAvailable => (0, false),
                };
                Some(self.persist(
                    record,
                    ReportOutcome::Polled {
                        stable_count,
                        newly_verified,
                    },
                    Some(reading),
                ))
            }
            Err(e) => {
                self.verifier.apply_failure(record, &e, now);
                Some(self.persist(
                    record,
                    ReportOutcome::Error {
                        transient: e.is_transient(),
                    },
                    None,
                ))
            }
        }
    }

    async fn fetch(
        &self,
        record: &RunRecord,
        isolation_key: &str,
    ) -> Result<UsageAggregate, UsageApiError> {
        let window = UsageWindow::new(record.start_timestamp, record.end_timestamp)?;
        self.source.fetch_usage(window, isolation_key).await
    }

    /// Save the record; a failed write turns the line into an error.
    fn persist(
        &self,
        record: &RunRecord,
        outcome: ReportOutcome,
        totals: Option<UsageAggregate>,
    ) -> ReconciliationReport {
        match self.store.save(record) {
            Ok(()) => report_for(record, outcome, totals),
            Err(e) => {
                tracing::error!(run_id = %record.run_id, error = %e, "Failed to save run record");
                let mut report = report_for(record, ReportOutcome::Error { transient: false }, totals);
                report.message = Some(e.to_string());
                report
            }
        }
    }
}

fn report_for(
    record: &RunRecord,
    outcome: ReportOutcome,
    totals: Option<UsageAggregate>,
) -> ReconciliationReport {
    ReconciliationReport {
        run_id: record.run_id.clone(),
        framework: Some(record.framework.clone()),
        status: Some(record.reconciliation.status),
        outcome,
        totals,
        message: record.reconciliation.message.clone(),
    }
}
