//! Status command implementation

use crate::cli::output::{format_runs_json, format_runs_table, RunView};
use crate::cli::StatusArgs;
use crate::logging::init_tracing;
use crate::run::RunStore;
use crate::verify::VerificationStatus;

/// Handle `tally status`
pub fn handle_status(args: &StatusArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = args.store.load_config()?;
    init_tracing(&config.logging)?;

    let status_filter: Option<VerificationStatus> = args
        .status
        .as_deref()
        .map(|s| {
            s.parse().map_err(|e: String| {
                format!(
                    "{}. Use: pending, data_not_available, warning, verified, failed, stale",
                    e
                )
            })
        })
        .transpose()?;

    let store = RunStore::new(&config.store.runs_dir);
    render_status(&store, status_filter, args.framework.as_deref(), args.json)
}

fn render_status(
    store: &RunStore,
    status: Option<VerificationStatus>,
    framework: Option<&str>,
    json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut views = Vec::new();
    for (run_id, loaded) in store.list()? {
        match loaded {
            Ok(record) => views.push(RunView::from(&record)),
            Err(e) => tracing::warn!(run_id = %run_id, error = %e, "Skipping unreadable run record"),
        }
    }

    views.retain(|v| status.map_or(true, |s| v.status == s));
    views.retain(|v| framework.map_or(true, |f| v.framework == f));

    if json {
        Ok(format_runs_json(&views)?)
    } else {
        Ok(format_runs_table(&views))
    }
}
