//! Run record store errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or writing run records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid run record '{run_id}': {message}")]
    Schema { run_id: String, message: String },

    #[error("run not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
