//! Usage aggregate, query window and usage API wire types.

use super::UsageApiError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Token totals from one usage query.
///
/// Produced fresh on every reconciliation attempt and only ever compared,
/// never mutated after the fact. Stability means exact equality on all fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageAggregate {
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub api_calls: u64,
    /// Cache reads; always a subset of `tokens_in`
    pub cached_tokens: u64,
}

impl UsageAggregate {
    pub fn new(tokens_in: u64, tokens_out: u64, api_calls: u64, cached_tokens: u64) -> Self {
        Self {
            tokens_in,
            tokens_out,
            api_calls,
            cached_tokens,
        }
    }

    /// True when the API reported nothing at all for the window.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn total_tokens(&self) -> u64 {
        self.tokens_in.saturating_add(self.tokens_out)
    }

    /// Check the `cached_tokens <= tokens_in` invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.cached_tokens > self.tokens_in {
            return Err(format!(
                "cached_tokens ({}) exceeds tokens_in ({})",
                self.cached_tokens, self.tokens_in
            ));
        }
        Ok(())
    }

    pub(crate) fn add_row(&mut self, row: &UsageRow) {
        self.tokens_in = self.tokens_in.saturating_add(row.tokens_in());
        self.tokens_out = self.tokens_out.saturating_add(row.output_tokens);
        self.api_calls = self.api_calls.saturating_add(row.request_count);
        self.cached_tokens = self.cached_tokens.saturating_add(row.cache_read_input_tokens);
    }
}

impl std::fmt::Display for UsageAggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "in={} out={} cached={} calls={}",
            self.tokens_in, self.tokens_out, self.cached_tokens, self.api_calls
        )
    }
}

/// Bucket granularity offered by the usage API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketWidth {
    Minute,
    Hour,
    Day,
}

impl BucketWidth {
    /// Query parameter value
    pub fn as_param(&self) -> &'static str {
        match self {
            BucketWidth::Minute => "1m",
            BucketWidth::Hour => "1h",
            BucketWidth::Day => "1d",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            BucketWidth::Minute => 60,
            BucketWidth::Hour => 3_600,
            BucketWidth::Day => 86_400,
        }
    }

    /// Maximum buckets the API returns per page at this width
    pub fn max_buckets(&self) -> u32 {
        match self {
            BucketWidth::Minute => 1_440,
            BucketWidth::Hour => 168,
            BucketWidth::Day => 31,
        }
    }
}

/// A `[start, end)` query window in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageWindow {
    start: i64,
    end: i64,
}

impl UsageWindow {
    pub fn new(start: i64, end: i64) -> Result<Self, UsageApiError> {
        if start >= end {
            return Err(UsageApiError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    /// Number of aligned buckets of `width` overlapping the window.
    pub fn bucket_count(&self, width: BucketWidth) -> u64 {
        let secs = width.seconds();
        let first = self.start.div_euclid(secs);
        let last = (self.end - 1).div_euclid(secs);
        (last - first + 1) as u64
    }

    /// Finest width whose bucket count fits in one page; days otherwise.
    pub fn finest_width(&self) -> BucketWidth {
        [BucketWidth::Minute, BucketWidth::Hour]
            .into_iter()
            .find(|w| self.bucket_count(*w) <= u64::from(w.max_buckets()))
            .unwrap_or(BucketWidth::Day)
    }

    /// Page size to request at `width`.
    pub fn page_limit(&self, width: BucketWidth) -> u32 {
        self.bucket_count(width).min(u64::from(width.max_buckets())) as u32
    }

    pub fn starting_at(&self) -> Result<String, UsageApiError> {
        to_rfc3339(self.start)
    }

    pub fn ending_at(&self) -> Result<String, UsageApiError> {
        to_rfc3339(self.end)
    }
}

fn to_rfc3339(ts: i64) -> Result<String, UsageApiError> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .ok_or(UsageApiError::InvalidWindow { start: ts, end: ts })
}

/// One page of the usage report.
#[derive(Debug, Clone, Deserialize)]
pub struct UsagePage {
    pub data: Vec<UsageBucket>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page: Option<String>,
}

/// A fixed-width time slice; may hold several rows (one per grouped key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBucket {
    pub starting_at: DateTime<Utc>,
    pub ending_at: DateTime<Utc>,
    #[serde(default)]
    pub results: Vec<UsageRow>,
}

/// One result row within a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRow {
    /// Present when the report is grouped by key; absent when the filter collapsed it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<String>,
    #[serde(default)]
    pub uncached_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub request_count: u64,
}

impl UsageRow {
    pub fn tokens_in(&self) -> u64 {
        self.uncached_input_tokens
            .saturating_add(self.cache_read_input_tokens)
            .saturating_add(self.cache_creation_input_tokens)
    }
}
