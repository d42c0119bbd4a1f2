//! Reconcile command implementation

use crate::cli::output::{format_reports_json, format_reports_text};
use crate::cli::ReconcileArgs;
use crate::logging::init_tracing;
use crate::scheduler::{ReconcileOptions, Reconciler};
use tokio_util::sync::CancellationToken;

/// Cancel the batch on Ctrl+C. The run in flight is abandoned unsaved.
async fn cancel_on_interrupt(cancel_token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::warn!("Interrupt received, stopping after the current run"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                    return;
                }
            }
        }
        _ = cancel_token.cancelled() => return,
    }
    cancel_token.cancel();
}

/// Handle `tally reconcile`: one batch over every run that is due.
pub async fn run_reconcile(args: ReconcileArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = args.store.load_config()?;
    init_tracing(&config.logging)?;

    tracing::info!(
        runs_dir = %config.store.runs_dir.display(),
        frameworks = config.frameworks.len(),
        min_stable = config.verification.min_stable_verifications,
        min_interval_minutes = config.verification.min_interval_minutes,
        max_age_hours = config.verification.max_age_hours,
        "Loaded reconciler configuration"
    );

    let reconciler = Reconciler::from_config(config)?;

    let cancel_token = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_interrupt(cancel_token.clone()));

    let options = ReconcileOptions {
        include_verified: args.include_verified,
        include_stale: args.include_stale,
        cancel: Some(cancel_token.clone()),
        ..ReconcileOptions::at_current_time()
    };
    let result = reconciler.reconcile_pending(&options).await;

    // Release the signal listener
    cancel_token.cancel();
    let _ = interrupt.await;

    let reports = result?;
    if args.json {
        Ok(format_reports_json(&reports)?)
    } else {
        Ok(format_reports_text(&reports))
    }
}
