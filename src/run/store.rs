//! Directory-backed run record store.
//!
//! Layout: `<root>/<run_id>/metrics.json`. Writes go through a temporary file
//! in the same directory and are renamed into place, so a concurrent reader
//! sees either the old document or the new one, never a torn write.

use super::{RunRecord, StoreError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const METRICS_FILE: &str = "metrics.json";

/// Reads and writes per-run metrics documents.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id).join(METRICS_FILE)
    }

    /// Load every run under the root, sorted by run id.
    ///
    /// A missing root is an empty store. Documents that fail to load are
    /// returned individually so one bad file doesn't hide the others.
    pub fn list(&self) -> Result<Vec<(String, Result<RunRecord, StoreError>)>, StoreError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(root = %self.root.display(), "Run store directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        let mut run_ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let path = entry.path();
            if !path.join(METRICS_FILE).is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                run_ids.push(name.to_string());
            }
        }
        run_ids.sort();

        Ok(run_ids
            .into_iter()
            .map(|run_id| {
                let record = self.load(&run_id);
                (run_id, record)
            })
            .collect())
    }

    /// Load and validate one run record.
    pub fn load(&self, run_id: &str) -> Result<RunRecord, StoreError> {
        let path = self.path_for(run_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(run_id.to_string()))
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let record: RunRecord =
            serde_json::from_str(&content).map_err(|e| StoreError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;

        if record.run_id != run_id {
            return Err(StoreError::Schema {
                run_id: run_id.to_string(),
                message: format!("document run_id '{}' does not match its directory", record.run_id),
            });
        }
        record.validate().map_err(|message| StoreError::Schema {
            run_id: run_id.to_string(),
            message,
        })?;

        Ok(record)
    }

    /// Atomically write a run record.
    pub fn save(&self, record: &RunRecord) -> Result<(), StoreError> {
        record.validate().map_err(|message| StoreError::Schema {
            run_id: record.run_id.clone(),
            message,
        })?;

        let path = self.path_for(&record.run_id);
        let dir = self.root.join(&record.run_id);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let json = serde_json::to_vec_pretty(record).map_err(|e| StoreError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tmp.write_all(&json)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| StoreError::io(&path, e.error))?;

        tracing::debug!(
            run_id = %record.run_id,
            status = %record.reconciliation.status,
            path = %path.display(),
            "Saved run record"
        );
        Ok(())
    }
}
