//! Output formatting helpers for CLI commands

use crate::run::RunRecord;
use crate::scheduler::{BatchSummary, ReconciliationReport};
use crate::verify::VerificationStatus;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// View model for run status display
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunView {
    pub run_id: String,
    pub framework: String,
    pub status: VerificationStatus,
    pub stable_count: u32,
    pub attempts: usize,
    pub last_polled: Option<i64>,
    pub tokens_in: Option<u64>,
    pub tokens_out: Option<u64>,
    pub cost_usd: Option<f64>,
    pub message: Option<String>,
}

impl From<&RunRecord> for RunView {
    fn from(record: &RunRecord) -> Self {
        let totals = record.aggregate_totals.as_ref();
        Self {
            run_id: record.run_id.clone(),
            framework: record.framework.clone(),
            status: record.reconciliation.status,
            stable_count: record.reconciliation.consecutive_stable_count,
            attempts: record.reconciliation.attempts.len(),
            last_polled: record.reconciliation.last_attempt().map(|a| a.timestamp),
            tokens_in: totals.map(|t| t.usage.tokens_in),
            tokens_out: totals.map(|t| t.usage.tokens_out),
            cost_usd: totals.and_then(|t| t.cost_usd),
            message: record.reconciliation.message.clone(),
        }
    }
}

/// Colored status label
pub fn status_label(status: VerificationStatus) -> String {
    match status {
        VerificationStatus::Verified => "verified".green().to_string(),
        VerificationStatus::Pending => "pending".yellow().to_string(),
        VerificationStatus::DataNotAvailable => "data_not_available".cyan().to_string(),
        VerificationStatus::Warning => "warning".red().bold().to_string(),
        VerificationStatus::Failed => "failed".red().to_string(),
        VerificationStatus::Stale => "stale".magenta().to_string(),
    }
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Format runs as a table
pub fn format_runs_table(runs: &[RunView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Run", "Framework", "Status", "Stable", "Attempts", "Last Poll", "Tokens In",
        "Tokens Out", "Cost",
    ]);

    for r in runs {
        table.add_row(vec![
            Cell::new(&r.run_id),
            Cell::new(&r.framework),
            Cell::new(status_label(r.status)),
            Cell::new(r.stable_count),
            Cell::new(r.attempts),
            Cell::new(or_dash(r.last_polled.map(format_timestamp))),
            Cell::new(or_dash(r.tokens_in)),
            Cell::new(or_dash(r.tokens_out)),
            Cell::new(or_dash(r.cost_usd.map(|c| format!("${:.4}", c)))),
        ]);
    }

    table.to_string()
}

/// Format runs as JSON
pub fn format_runs_json(runs: &[RunView]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({ "runs": runs }))
}

/// Format a batch report, one line per run plus a summary
pub fn format_reports_text(reports: &[ReconciliationReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let marker = if report.is_error() {
            "✗".red().to_string()
        } else {
            match report.status {
                Some(VerificationStatus::Verified) => "✓".green().to_string(),
                Some(VerificationStatus::Warning) => "!".red().bold().to_string(),
                _ => "·".to_string(),
            }
        };
        out.push_str(&format!("{} {}\n", marker, report));
    }
    out.push_str(&BatchSummary::from_reports(reports).to_string());
    out
}

/// Format a batch report as JSON
pub fn format_reports_json(reports: &[ReconciliationReport]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({
        "reports": reports,
        "summary": BatchSummary::from_reports(reports),
    }))
}
