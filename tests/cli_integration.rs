//! CLI Integration Tests
//!
//! End-to-end tests for the `tally` binary using assert_cmd.

mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use tally::run::{RunRecord, RunStore};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Get the tally binary for testing, isolated from the caller's environment
fn tally_cmd() -> Command {
    let mut cmd = Command::cargo_bin("tally").unwrap();
    for var in [
        "TALLY_RUNS_DIR",
        "TALLY_USAGE_API_URL",
        "TALLY_LOG_LEVEL",
        "TALLY_LOG_FORMAT",
        "TALLY_MIN_STABLE",
        "TALLY_MIN_INTERVAL_MINUTES",
        "TALLY_MAX_AGE_HOURS",
        "TALLY_ADMIN_KEY",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_version_output() {
    tally_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tally"));
}

#[test]
fn test_help_shows_all_commands() {
    tally_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reconcile"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_reconcile_help() {
    tally_cmd()
        .args(["reconcile", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--runs-dir"))
        .stdout(predicate::str::contains("--include-verified"))
        .stdout(predicate::str::contains("--include-stale"));
}

#[test]
fn test_config_init_creates_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("tally.toml");

    tally_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap()])
        .assert()
        .success();

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[frameworks.agentic]"));
}

#[test]
fn test_config_init_no_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("tally.toml");
    std::fs::write(&config_path, "existing content").unwrap();

    tally_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert_eq!(content, "existing content");
}

#[test]
fn test_completions_bash() {
    tally_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reconcile"));
}

#[test]
fn test_reconcile_without_frameworks_fails_fast() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("tally.toml");
    std::fs::write(&config_path, "[verification]\nmin_interval_minutes = 0\n").unwrap();

    tally_cmd()
        .args(["reconcile", "-c", config_path.to_str().unwrap()])
        .env("TALLY_ADMIN_KEY", ADMIN_KEY)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("frameworks"));
}

#[test]
fn test_reconcile_without_admin_key_fails_fast() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("tally.toml");
    std::fs::write(
        &config_path,
        reconciler_toml("http://127.0.0.1:9", &temp_dir.path().join("runs")),
    )
    .unwrap();

    tally_cmd()
        .args(["reconcile", "-c", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TALLY_ADMIN_KEY"));
}

#[test]
fn test_reconcile_rejects_malformed_isolation_key() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("tally.toml");
    std::fs::write(&config_path, "[frameworks.agentic]\nisolation_key = \"bad key\"\n").unwrap();

    tally_cmd()
        .args(["reconcile", "-c", config_path.to_str().unwrap()])
        .env("TALLY_ADMIN_KEY", ADMIN_KEY)
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed isolation key"));
}

#[test]
fn test_status_json_reads_runs_dir() {
    let temp_dir = TempDir::new().unwrap();
    let runs_dir = temp_dir.path().join("runs");
    let store = RunStore::new(&runs_dir);
    save_run(&store, "R1", "agentic");
    save_run(&store, "R2", "baseline");

    tally_cmd()
        .args([
            "status",
            "-c",
            temp_dir.path().join("missing.toml").to_str().unwrap(),
            "--runs-dir",
            runs_dir.to_str().unwrap(),
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"R1\""))
        .stdout(predicate::str::contains("\"R2\""))
        .stdout(predicate::str::contains("\"pending\""));
}

#[test]
fn test_status_rejects_unknown_filter() {
    let temp_dir = TempDir::new().unwrap();

    tally_cmd()
        .args([
            "status",
            "--runs-dir",
            temp_dir.path().to_str().unwrap(),
            "--status",
            "done",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid verification status"));
}

#[test]
fn test_export_empty_store() {
    let temp_dir = TempDir::new().unwrap();

    tally_cmd()
        .args(["export", "--runs-dir", temp_dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"verified\": []"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reconcile_twice_then_export() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REPORT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(r1_page(AGENTIC_KEY)))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let runs_dir = temp_dir.path().join("runs");
    let config_path = temp_dir.path().join("tally.toml");
    std::fs::write(&config_path, reconciler_toml(&mock_server.uri(), &runs_dir)).unwrap();

    // The binary uses wall-clock time, so the run must be recent
    let now = chrono::Utc::now().timestamp();
    RunStore::new(&runs_dir)
        .save(&RunRecord::new("R1", "agentic", now - 600, now - 60))
        .unwrap();

    let config_arg = config_path.to_str().unwrap().to_string();
    let reconcile = || {
        tally_cmd()
            .args(["reconcile", "-c", &config_arg])
            .env("TALLY_ADMIN_KEY", ADMIN_KEY)
            .assert()
            .success()
    };

    reconcile().stdout(predicate::str::contains("R1 [agentic] pending"));
    reconcile()
        .stdout(predicate::str::contains("R1 [agentic] verified"))
        .stdout(predicate::str::contains("1 verified"));

    let export_path = temp_dir.path().join("verified.json");
    tally_cmd()
        .args([
            "export",
            "-c",
            &config_arg,
            "-o",
            export_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 verified runs"));

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&export_path).unwrap()).unwrap();
    assert_eq!(exported["verified"][0]["run_id"], "R1");
    assert_eq!(exported["verified"][0]["tokens_in"], 5000);
}
