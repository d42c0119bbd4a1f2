//! Usage-accounting API client.
//!
//! Queries the external usage report for a run's time window, filtered to one
//! isolation key, at the finest bucket width the window allows, and flattens
//! the (paginated) result into a [`UsageAggregate`].
//!
//! No retries happen here: a failed call is returned as a typed
//! [`UsageApiError`] and the scheduler retries on its next invocation.

mod aggregate;
mod error;
mod types;

pub use aggregate::{aggregate, aggregate_for_key};
pub use error::UsageApiError;
pub use types::{BucketWidth, UsageAggregate, UsageBucket, UsagePage, UsageRow, UsageWindow};

use crate::config::UsageApiConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Longest upstream error body kept in [`UsageApiError::Upstream`].
const MAX_ERROR_BODY: usize = 512;

/// Source of aggregated usage for a time window and isolation key.
///
/// Implemented by [`UsageApiClient`]; tests substitute scripted sources.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Fetch the aggregate for `window`, restricted to `isolation_key`.
    ///
    /// An empty report yields a zero aggregate, not an error.
    async fn fetch_usage(
        &self,
        window: UsageWindow,
        isolation_key: &str,
    ) -> Result<UsageAggregate, UsageApiError>;
}

/// HTTP client for the usage report endpoint.
pub struct UsageApiClient {
    /// Endpoint URL (base URL + report path)
    endpoint: String,
    /// Administrative credential, sent in `auth_header`
    admin_key: String,
    auth_header: String,
    api_version: String,
    timeout_seconds: u64,
    max_pages: u32,
    /// Shared HTTP client for connection pooling
    client: Client,
}

impl UsageApiClient {
    /// Create a client with its own connection pool.
    pub fn new(config: &UsageApiConfig, admin_key: String) -> Result<Self, UsageApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| UsageApiError::Configuration(e.to_string()))?;
        Ok(Self::with_client(config, admin_key, client))
    }

    /// Create a client with a custom HTTP client (for testing).
    pub fn with_client(config: &UsageApiConfig, admin_key: String, client: Client) -> Self {
        Self {
            endpoint: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                config.report_path
            ),
            admin_key,
            auth_header: config.auth_header.clone(),
            api_version: config.api_version.clone(),
            timeout_seconds: config.timeout_seconds,
            max_pages: config.max_pages,
            client,
        }
    }

    /// Fetch every bucket overlapping `window` for `isolation_key`, following pagination.
    pub async fn fetch_buckets(
        &self,
        window: UsageWindow,
        isolation_key: &str,
    ) -> Result<Vec<UsageBucket>, UsageApiError> {
        let width = window.finest_width();
        let mut buckets = Vec::new();
        let mut cursor: Option<String> = None;

        for page_number in 0..self.max_pages {
            let page = self
                .fetch_page(window, width, isolation_key, cursor.as_deref())
                .await?;

            tracing::debug!(
                page = page_number,
                buckets = page.data.len(),
                has_more = page.has_more,
                bucket_width = width.as_param(),
                "Fetched usage report page"
            );

            validate_buckets(&page.data)?;
            buckets.extend(page.data);

            if !page.has_more {
                return Ok(buckets);
            }
            match page.next_page {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => {
                    return Err(UsageApiError::InvalidResponse(
                        "has_more is true but next_page is missing".to_string(),
                    ))
                }
            }
        }

        Err(UsageApiError::InvalidResponse(format!(
            "pagination exceeded {} pages",
            self.max_pages
        )))
    }

    async fn fetch_page(
        &self,
        window: UsageWindow,
        width: BucketWidth,
        isolation_key: &str,
        page: Option<&str>,
    ) -> Result<UsagePage, UsageApiError> {
        let mut query = vec![
            ("starting_at", window.starting_at()?),
            ("ending_at", window.ending_at()?),
            ("bucket_width", width.as_param().to_string()),
            ("api_key_ids[]", isolation_key.to_string()),
            ("group_by[]", "api_key_id".to_string()),
            ("limit", window.page_limit(width).to_string()),
        ];
        if let Some(cursor) = page {
            query.push(("page", cursor.to_string()));
        }

        let mut request = self
            .client
            .get(&self.endpoint)
            .header(self.auth_header.as_str(), &self.admin_key)
            .query(&query);
        if !self.api_version.is_empty() {
            request = request.header("anthropic-version", &self.api_version);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UsageApiError::from_reqwest(e, self.timeout_seconds))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Err(UsageApiError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(UsageApiError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| UsageApiError::from_reqwest(e, self.timeout_seconds))?;

        serde_json::from_str(&body).map_err(|e| {
            UsageApiError::InvalidResponse(format!("failed to parse usage report: {}", e))
        })
    }
}

fn validate_buckets(buckets: &[UsageBucket]) -> Result<(), UsageApiError> {
    for bucket in buckets {
        if bucket.ending_at <= bucket.starting_at {
            return Err(UsageApiError::InvalidResponse(format!(
                "bucket ending_at {} is not after starting_at {}",
                bucket.ending_at, bucket.starting_at
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl UsageSource for UsageApiClient {
    async fn fetch_usage(
        &self,
        window: UsageWindow,
        isolation_key: &str,
    ) -> Result<UsageAggregate, UsageApiError> {
        let buckets = self.fetch_buckets(window, isolation_key).await?;
        let total = aggregate_for_key(&buckets, isolation_key);
        total.validate().map_err(UsageApiError::InvalidResponse)?;

        tracing::debug!(
            isolation_key = isolation_key,
            window_start = window.start(),
            window_end = window.end(),
            buckets = buckets.len(),
            tokens_in = total.tokens_in,
            tokens_out = total.tokens_out,
            "Aggregated usage"
        );

        Ok(total)
    }
}
