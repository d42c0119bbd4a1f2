//! Shared test utilities for Tally integration tests.
//!
//! Provides builders for usage-report JSON, configurations pointed at a mock
//! server, and run records on disk.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::Path;
use tally::config::{FrameworkConfig, Pricing, ReconcilerConfig, UsageApiConfig};
use tally::run::{RunRecord, RunStore};

// =============================================================================
// Well-Known Test Constants
// =============================================================================

/// 2023-11-14T22:13:20Z
pub const RUN_START: i64 = 1_700_000_000;

/// Ten minutes after [`RUN_START`]
pub const RUN_END: i64 = 1_700_000_600;

pub const RUN_START_RFC3339: &str = "2023-11-14T22:13:20Z";
pub const RUN_END_RFC3339: &str = "2023-11-14T22:23:20Z";

pub const ADMIN_KEY: &str = "sk-admin-test";
pub const AGENTIC_KEY: &str = "apikey_agentic";
pub const BASELINE_KEY: &str = "apikey_baseline";
pub const REPORT_PATH: &str = "/v1/organizations/usage_report/messages";

// =============================================================================
// Usage Report Builders
// =============================================================================

/// One result row, tagged with the key it belongs to.
pub fn usage_row(key: &str, uncached_in: u64, cache_read: u64, out: u64, calls: u64) -> Value {
    json!({
        "api_key_id": key,
        "uncached_input_tokens": uncached_in,
        "cache_read_input_tokens": cache_read,
        "cache_creation_input_tokens": 0,
        "output_tokens": out,
        "request_count": calls,
    })
}

/// A one-minute bucket starting `minute` minutes after [`RUN_START`]'s minute.
pub fn minute_bucket(minute: i64, rows: Vec<Value>) -> Value {
    let base = RUN_START - RUN_START.rem_euclid(60);
    let start = chrono::DateTime::from_timestamp(base + minute * 60, 0).unwrap();
    let end = chrono::DateTime::from_timestamp(base + (minute + 1) * 60, 0).unwrap();
    json!({
        "starting_at": start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "ending_at": end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "results": rows,
    })
}

/// A final report page.
pub fn usage_page(buckets: Vec<Value>) -> Value {
    json!({ "data": buckets, "has_more": false, "next_page": null })
}

/// A page that points at `next_page`.
pub fn usage_page_with_more(buckets: Vec<Value>, next_page: &str) -> Value {
    json!({ "data": buckets, "has_more": true, "next_page": next_page })
}

/// The R1 reading: 5000 tokens in, 2000 out, over two buckets.
pub fn r1_page(key: &str) -> Value {
    usage_page(vec![
        minute_bucket(0, vec![usage_row(key, 3000, 0, 1200, 2)]),
        minute_bucket(1, vec![usage_row(key, 2000, 0, 800, 1)]),
    ])
}

// =============================================================================
// Configuration Builders
// =============================================================================

/// Usage API settings pointed at a mock server.
pub fn api_config(base_url: &str) -> UsageApiConfig {
    UsageApiConfig {
        base_url: base_url.to_string(),
        timeout_seconds: 5,
        ..Default::default()
    }
}

/// Two frameworks, no poll spacing, two stable readings required.
pub fn reconciler_config(base_url: &str, runs_dir: &Path) -> ReconcilerConfig {
    let mut config = ReconcilerConfig::default();
    config.usage_api = api_config(base_url);
    config.store.runs_dir = runs_dir.to_path_buf();
    config.verification.min_interval_minutes = 0;

    let mut agentic = FrameworkConfig::new(AGENTIC_KEY);
    agentic.pricing = Some(Pricing {
        input_per_million: 3.0,
        output_per_million: 15.0,
        cached_input_per_million: None,
    });
    config.frameworks.insert("agentic".to_string(), agentic);
    config
        .frameworks
        .insert("baseline".to_string(), FrameworkConfig::new(BASELINE_KEY));
    config
}

/// The same configuration as TOML, for driving the binary.
pub fn reconciler_toml(base_url: &str, runs_dir: &Path) -> String {
    format!(
        r#"
[store]
runs_dir = "{runs_dir}"

[usage_api]
base_url = "{base_url}"
admin_key_env = "TALLY_ADMIN_KEY"
timeout_seconds = 5

[verification]
min_stable_verifications = 2
min_interval_minutes = 0
max_age_hours = 24

[frameworks.agentic]
isolation_key = "{agentic}"

[frameworks.baseline]
isolation_key = "{baseline}"
"#,
        runs_dir = runs_dir.display(),
        base_url = base_url,
        agentic = AGENTIC_KEY,
        baseline = BASELINE_KEY,
    )
}

// =============================================================================
// Run Records
// =============================================================================

/// Save a completed run over the standard window.
pub fn save_run(store: &RunStore, run_id: &str, framework: &str) -> RunRecord {
    let record = RunRecord::new(run_id, framework, RUN_START, RUN_END);
    store.save(&record).unwrap();
    record
}
