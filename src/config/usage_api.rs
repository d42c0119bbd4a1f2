//! Usage-accounting API configuration

use super::ConfigError;
use serde::{Deserialize, Serialize};

/// Connection settings for the external usage-accounting API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageApiConfig {
    /// Base URL (e.g., "https://api.anthropic.com")
    pub base_url: String,
    /// Path of the usage report endpoint
    pub report_path: String,
    /// Environment variable holding the administrative credential
    pub admin_key_env: String,
    /// Header the credential is sent in
    pub auth_header: String,
    /// Sent as `anthropic-version` when non-empty
    pub api_version: String,
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// Upper bound on pages followed for a single fetch
    pub max_pages: u32,
}

impl Default for UsageApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            report_path: "/v1/organizations/usage_report/messages".to_string(),
            admin_key_env: "TALLY_ADMIN_KEY".to_string(),
            auth_header: "x-api-key".to_string(),
            api_version: "2023-06-01".to_string(),
            timeout_seconds: 30,
            max_pages: 50,
        }
    }
}

impl UsageApiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "usage_api.base_url".to_string(),
                message: "URL cannot be empty".to_string(),
            });
        }
        if !self.report_path.starts_with('/') {
            return Err(ConfigError::Validation {
                field: "usage_api.report_path".to_string(),
                message: "path must start with '/'".to_string(),
            });
        }
        if self.admin_key_env.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "usage_api.admin_key_env".to_string(),
                message: "environment variable name cannot be empty".to_string(),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "usage_api.timeout_seconds".to_string(),
                message: "timeout must be non-zero".to_string(),
            });
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Validation {
                field: "usage_api.max_pages".to_string(),
                message: "max_pages must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Read the admin credential from the configured environment variable.
    pub fn resolve_admin_key(&self) -> Result<String, ConfigError> {
        match std::env::var(&self.admin_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingCredential(self.admin_key_env.clone())),
        }
    }
}
