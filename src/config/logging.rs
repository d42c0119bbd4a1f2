//! Logging configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Pretty-printed logs for humans
    #[default]
    Pretty,
    /// JSON logs for machine parsing (cron/CI collectors)
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Component-specific log levels (e.g., {"usage": "debug", "verify": "info"})
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_levels: Option<HashMap<String, String>>,
}

/// Modules that can be given their own level under `component_levels`.
pub const LOG_COMPONENTS: &[&str] = &[
    "analysis", "cli", "config", "run", "scheduler", "usage", "verify",
];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

impl LoggingConfig {
    /// Reject component overrides that would never match a target.
    pub fn validate(&self) -> Result<(), String> {
        let Some(levels) = &self.component_levels else {
            return Ok(());
        };
        let mut components: Vec<_> = levels.iter().collect();
        components.sort();
        for (component, level) in components {
            if !LOG_COMPONENTS.contains(&component.as_str()) {
                return Err(format!(
                    "unknown component '{}' (expected one of: {})",
                    component,
                    LOG_COMPONENTS.join(", ")
                ));
            }
            if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(format!("invalid level '{}' for component '{}'", level, component));
            }
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            component_levels: None,
        }
    }
}
