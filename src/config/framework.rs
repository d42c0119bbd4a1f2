//! Per-framework configuration

use super::ConfigError;
use serde::{Deserialize, Serialize};

/// Configuration for one benchmarked framework.
///
/// The isolation key is the usage-API identifier (e.g. an API key id) whose
/// traffic belongs exclusively to this framework. There is no default: a
/// framework without a key cannot be reconciled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkConfig {
    #[serde(default)]
    pub isolation_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
}

impl FrameworkConfig {
    pub fn new(isolation_key: impl Into<String>) -> Self {
        Self {
            isolation_key: isolation_key.into(),
            pricing: None,
        }
    }

    /// Validate the isolation key and pricing for `framework`.
    pub fn validate(&self, framework: &str) -> Result<(), ConfigError> {
        let key = self.isolation_key.trim();
        if key.is_empty() {
            return Err(ConfigError::MissingIsolationKey {
                framework: framework.to_string(),
            });
        }
        if key.len() != self.isolation_key.len()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::MalformedIsolationKey {
                framework: framework.to_string(),
                key: self.isolation_key.clone(),
            });
        }

        if let Some(pricing) = &self.pricing {
            pricing
                .validate()
                .map_err(|message| ConfigError::Validation {
                    field: format!("frameworks.{}.pricing", framework),
                    message,
                })?;
        }

        Ok(())
    }
}

/// Token pricing in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    /// Rate for cache reads; falls back to the input rate when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_input_per_million: Option<f64>,
}

impl Pricing {
    pub fn validate(&self) -> Result<(), String> {
        let rates = [
            ("input_per_million", Some(self.input_per_million)),
            ("output_per_million", Some(self.output_per_million)),
            ("cached_input_per_million", self.cached_input_per_million),
        ];
        for (name, rate) in rates {
            if let Some(rate) = rate {
                if !rate.is_finite() || rate < 0.0 {
                    return Err(format!("{} must be a non-negative number", name));
                }
            }
        }
        Ok(())
    }

    /// Cost in USD of the given token counts.
    ///
    /// Cached tokens are a subset of `tokens_in` and are billed at the cached rate.
    pub fn cost_usd(&self, tokens_in: u64, tokens_out: u64, cached_tokens: u64) -> f64 {
        let cached = cached_tokens.min(tokens_in);
        let uncached = tokens_in - cached;
        let cached_rate = self
            .cached_input_per_million
            .unwrap_or(self.input_per_million);

        (uncached as f64 * self.input_per_million
            + cached as f64 * cached_rate
            + tokens_out as f64 * self.output_per_million)
            / 1_000_000.0
    }
}
