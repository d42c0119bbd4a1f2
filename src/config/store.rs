//! Run record store configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where per-run metrics documents live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Each run is stored at `<runs_dir>/<run_id>/metrics.json`
    pub runs_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            runs_dir: PathBuf::from("results/runs"),
        }
    }
}
