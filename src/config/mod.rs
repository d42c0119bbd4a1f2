//! Configuration module for Tally
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`TALLY_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use tally::config::ReconcilerConfig;
//!
//! let toml = r#"
//! [frameworks.agentic]
//! isolation_key = "apikey_01"
//! "#;
//! let config: ReconcilerConfig = toml::from_str(toml).unwrap();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.verification.min_stable_verifications, 2);
//! ```

pub mod error;
pub mod framework;
pub mod logging;
pub mod store;
pub mod usage_api;
pub mod verification;

pub use error::ConfigError;
pub use framework::{FrameworkConfig, Pricing};
pub use logging::{LogFormat, LoggingConfig};
pub use store::StoreConfig;
pub use usage_api::UsageApiConfig;
pub use verification::VerificationConfig;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Unified configuration for the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Run record storage
    pub store: StoreConfig,
    /// Usage-accounting API connection
    pub usage_api: UsageApiConfig,
    /// Stability thresholds
    pub verification: VerificationConfig,
    /// Framework identifier -> isolation key and pricing
    pub frameworks: BTreeMap<String, FrameworkConfig>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ReconcilerConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (previous values are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("TALLY_RUNS_DIR") {
            self.store.runs_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("TALLY_USAGE_API_URL") {
            self.usage_api.base_url = url;
        }

        if let Ok(level) = std::env::var("TALLY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TALLY_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(value) = std::env::var("TALLY_MIN_STABLE") {
            if let Ok(n) = value.parse() {
                self.verification.min_stable_verifications = n;
            }
        }
        if let Ok(value) = std::env::var("TALLY_MIN_INTERVAL_MINUTES") {
            if let Ok(n) = value.parse() {
                self.verification.min_interval_minutes = n;
            }
        }
        if let Ok(value) = std::env::var("TALLY_MAX_AGE_HOURS") {
            if let Ok(n) = value.parse() {
                self.verification.max_age_hours = n;
            }
        }

        self
    }

    /// Validate configuration
    ///
    /// Every configured framework must carry a well-formed isolation key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.usage_api.validate()?;

        self.logging
            .validate()
            .map_err(|message| ConfigError::Validation {
                field: "logging.component_levels".to_string(),
                message,
            })?;

        self.verification
            .validate()
            .map_err(|message| ConfigError::Validation {
                field: "verification".to_string(),
                message,
            })?;

        if self.frameworks.is_empty() {
            return Err(ConfigError::Validation {
                field: "frameworks".to_string(),
                message: "at least one framework must be configured".to_string(),
            });
        }
        for (name, framework) in &self.frameworks {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: "frameworks".to_string(),
                    message: "framework name cannot be empty".to_string(),
                });
            }
            framework.validate(name)?;
        }

        Ok(())
    }

    /// Look up the configuration for the framework a run belongs to.
    pub fn framework_for(&self, run_id: &str, framework: &str) -> Result<&FrameworkConfig, ConfigError> {
        self.frameworks
            .get(framework)
            .ok_or_else(|| ConfigError::UnknownFramework {
                run_id: run_id.to_string(),
                framework: framework.to_string(),
            })
    }
}
