//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
///
/// All of these are fatal: they are raised before any run is polled.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Framework '{framework}' has no isolation key configured")]
    MissingIsolationKey { framework: String },

    #[error("Framework '{framework}' has a malformed isolation key: '{key}'")]
    MalformedIsolationKey { framework: String, key: String },

    #[error("Admin credential missing: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Run '{run_id}' uses framework '{framework}', which is not configured")]
    UnknownFramework { run_id: String, framework: String },
}
