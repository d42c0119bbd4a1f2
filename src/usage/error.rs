//! Error types for usage API queries.

use thiserror::Error;

/// Errors that can occur while fetching usage from the accounting API.
///
/// A failed fetch is never turned into a zero aggregate; callers keep the
/// run in its prior state and retry on a later invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageApiError {
    /// Query window is empty or inverted
    #[error("invalid query window: start {start} must be before end {end}")]
    InvalidWindow { start: i64, end: i64 },

    /// Connection failed, DNS error, TLS error, ...
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the client timeout
    #[error("request timeout after {0}s")]
    Timeout(u64),

    /// HTTP 429 from the usage API
    #[error("rate limited by usage API{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<u64> },

    /// Non-success status other than 429
    #[error("usage API error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Response body doesn't match the expected shape
    #[error("invalid usage response: {0}")]
    InvalidResponse(String),

    /// HTTP client could not be constructed
    #[error("HTTP client configuration error: {0}")]
    Configuration(String),
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(" (retry after {}s)", secs),
        None => String::new(),
    }
}

impl UsageApiError {
    /// Whether a later poll may succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        match self {
            UsageApiError::Network(_)
            | UsageApiError::Timeout(_)
            | UsageApiError::RateLimited { .. } => true,
            UsageApiError::Upstream { status, .. } => *status >= 500,
            UsageApiError::InvalidWindow { .. }
            | UsageApiError::InvalidResponse(_)
            | UsageApiError::Configuration(_) => false,
        }
    }

    /// Classify a reqwest error.
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout_seconds: u64) -> Self {
        if e.is_timeout() {
            UsageApiError::Timeout(timeout_seconds)
        } else if e.is_decode() {
            UsageApiError::InvalidResponse(e.to_string())
        } else {
            UsageApiError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            UsageApiError::Timeout(30).to_string(),
            "request timeout after 30s"
        );
        assert_eq!(
            UsageApiError::RateLimited {
                retry_after: Some(60)
            }
            .to_string(),
            "rate limited by usage API (retry after 60s)"
        );
        assert_eq!(
            UsageApiError::RateLimited { retry_after: None }.to_string(),
            "rate limited by usage API"
        );
        assert_eq!(
            UsageApiError::Upstream {
                status: 503,
                message: "overloaded".to_string()
            }
            .to_string(),
            "usage API error 503: overloaded"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(UsageApiError::Network("refused".to_string()).is_transient());
        assert!(UsageApiError::Timeout(5).is_transient());
        assert!(UsageApiError::RateLimited { retry_after: None }.is_transient());
        assert!(UsageApiError::Upstream {
            status: 502,
            message: String::new()
        }
        .is_transient());

        assert!(!UsageApiError::Upstream {
            status: 401,
            message: String::new()
        }
        .is_transient());
        assert!(!UsageApiError::InvalidResponse("missing data".to_string()).is_transient());
        assert!(!UsageApiError::InvalidWindow { start: 5, end: 5 }.is_transient());
    }
}
