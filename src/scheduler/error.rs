//! Batch-level reconciliation errors

use crate::config::ConfigError;
use crate::run::StoreError;
use crate::usage::UsageApiError;
use thiserror::Error;

/// Errors that abort a whole reconciliation batch.
///
/// Per-run failures (a fetch error, one unreadable document) never surface
/// here; they become error lines in the batch report instead.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("run store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("usage API client could not be created: {0}")]
    Client(UsageApiError),
}
