//! Export command implementation

use crate::analysis::{collect_verified, AnalysisSet};
use crate::cli::ExportArgs;
use crate::logging::init_tracing;
use crate::run::RunStore;

/// Handle `tally export`
///
/// Returns the JSON when writing to stdout, or a confirmation line when
/// `--output` is given.
pub fn handle_export(args: &ExportArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = args.store.load_config()?;
    init_tracing(&config.logging)?;

    let set = load_analysis_set(&RunStore::new(&config.store.runs_dir))?;
    let json = serde_json::to_string_pretty(&set)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &json)?;
            Ok(format!(
                "✓ Exported {} verified runs ({} excluded) to {}",
                set.verified.len(),
                set.excluded.len(),
                path.display()
            ))
        }
        None => Ok(json),
    }
}

/// Load every readable run and partition it for analysis.
pub fn load_analysis_set(store: &RunStore) -> Result<AnalysisSet, Box<dyn std::error::Error>> {
    let mut records = Vec::new();
    for (run_id, loaded) in store.list()? {
        match loaded {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(run_id = %run_id, error = %e, "Skipping unreadable run record"),
        }
    }
    Ok(collect_verified(&records))
}
