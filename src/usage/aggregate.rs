//! Bucket aggregation.
//!
//! Pure functions that flatten a usage report into a single [`UsageAggregate`].
//! Every row of every bucket is summed: a bucket carries one row per grouped
//! key, and reading only the first row silently drops usage.

use super::{UsageAggregate, UsageBucket};

/// Sum every row in every bucket.
pub fn aggregate(buckets: &[UsageBucket]) -> UsageAggregate {
    let mut total = UsageAggregate::default();
    for row in buckets.iter().flat_map(|b| b.results.iter()) {
        total.add_row(row);
    }
    total
}

/// Sum the rows belonging to `isolation_key`.
///
/// Rows tagged with a different key are other tenants sharing the bucket and
/// are skipped. Untagged rows are counted: they only appear when the server
/// side filter already collapsed the key dimension.
pub fn aggregate_for_key(buckets: &[UsageBucket], isolation_key: &str) -> UsageAggregate {
    let mut total = UsageAggregate::default();
    for row in buckets.iter().flat_map(|b| b.results.iter()) {
        match row.api_key_id.as_deref() {
            Some(key) if key != isolation_key => continue,
            _ => total.add_row(row),
        }
    }
    total
}
