//! Integration tests for the `unipulse` CLI binary.
//!
//! Recorded responses under `tests/fixtures` stand in for the store; the
//! live path is exercised against a wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `unipulse` binary with env isolation.
///
/// Clears all `UNIPULSE_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn unipulse_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("unipulse");
    cmd.env("HOME", "/tmp/unipulse-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/unipulse-cli-test-nonexistent")
        .env_remove("RUST_LOG")
        .env_remove("UNIPULSE_PROFILE")
        .env_remove("UNIPULSE_URL")
        .env_remove("UNIPULSE_DATABASE")
        .env_remove("UNIPULSE_SITE")
        .env_remove("UNIPULSE_CONFIG")
        .env_remove("UNIPULSE_OUTPUT")
        .env_remove("UNIPULSE_INSECURE")
        .env_remove("UNIPULSE_TIMEOUT")
        .env_remove("UNIPULSE_PASSWORD")
        .env_remove("UNIPULSE_DEFAULT_PROFILE")
        .env_remove("UNIPULSE_DEFAULTS__RANGE")
        .env_remove("UNIPULSE_DEFAULTS__OUTPUT");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}):\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = unipulse_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    unipulse_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("traffic")
            .and(predicate::str::contains("trend"))
            .and(predicate::str::contains("ssids"))
            .and(predicate::str::contains("query")),
    );
}

#[test]
fn test_version_flag() {
    unipulse_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("unipulse"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    unipulse_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unipulse"));
}

#[test]
fn test_completions_invalid_shell() {
    unipulse_cmd()
        .args(["completions", "tcsh"])
        .assert()
        .failure();
}

// ── Query printing ──────────────────────────────────────────────────

#[test]
fn test_query_totals_statement() {
    unipulse_cmd()
        .args(["query", "totals", "--range", "7d", "--name-tag", "hostname"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#"last("rx_bytes") - first("rx_bytes") AS "rx""#)
                .and(predicate::str::contains("time > now() - 7d"))
                .and(predicate::str::contains(r#"GROUP BY "mac", "hostname""#)),
        );
}

#[test]
fn test_query_rates_reports_interval() {
    let output = unipulse_cmd()
        .args(["query", "rates", "-m", "usg_wan_ports", "-b", "ifname", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let json = stdout_json(&output);
    assert_eq!(json["interval"], "30m");
    let query = json["query"].as_str().unwrap();
    assert!(query.contains(r#"mean("rx_bytes-r") AS "rx_bytes-r""#), "{query}");
    assert!(query.contains("GROUP BY time(30m)"), "{query}");
}

#[test]
fn test_query_site_filter_is_escaped() {
    unipulse_cmd()
        .args(["--site", "O'Brien's", "query", "vaps"])
        .assert()
        .success()
        .stdout(predicate::str::contains("'O''Brien''s'"));
}

#[test]
fn test_injected_range_is_a_usage_error() {
    let output = unipulse_cmd()
        .args(["query", "totals", "--range", "1d; DROP DATABASE unifi"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("time range"), "{text}");
    assert!(!text.contains("SELECT"), "{text}");
}

#[test]
fn test_injected_identifier_is_a_usage_error() {
    unipulse_cmd()
        .args(["query", "counter", "--column", "rx\" FROM secrets --"])
        .assert()
        .code(2);
}

// ── Recorded responses ──────────────────────────────────────────────

#[test]
fn test_traffic_from_recording() {
    let output = unipulse_cmd()
        .arg("--input")
        .arg(fixture("client_totals.json"))
        .args(["traffic", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let json = stdout_json(&output);
    let rows = json.as_array().unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
    // The counter reset (negative delta) clamps to zero and is hidden.
    assert_eq!(
        ids,
        vec!["aa:aa:aa:aa:aa:02", "aa:aa:aa:aa:aa:01", "aa:aa:aa:aa:aa:03"]
    );
    assert_eq!(rows[0]["name"], "aa:aa:aa:aa:aa:02");
    assert_eq!(rows[0]["total_bytes"], 1_048_578_048_u64);
    assert_eq!(rows[1]["name"], "laptop");
    assert_eq!(rows[1]["tags"]["hostname"], "laptop");
}

#[test]
fn test_traffic_sort_and_limit() {
    let output = unipulse_cmd()
        .arg("--input")
        .arg(fixture("client_totals.json"))
        .args(["traffic", "--sort", "name", "--asc", "-o", "plain"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "aa:aa:aa:aa:aa:02\naa:aa:aa:aa:aa:03\naa:aa:aa:aa:aa:01"
    );

    unipulse_cmd()
        .arg("--input")
        .arg(fixture("client_totals.json"))
        .args(["traffic", "--include-zero", "--asc", "-l", "1", "-o", "plain"])
        .assert()
        .success()
        .stdout("aa:aa:aa:aa:aa:04\n");
}

#[test]
fn test_traffic_table_output() {
    unipulse_cmd()
        .arg("--input")
        .arg(fixture("client_totals.json"))
        .args(["--color", "never", "traffic"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("laptop")
                .and(predicate::str::contains("Total"))
                .and(predicate::str::contains("rebooted").not()),
        );
}

#[test]
fn test_ssids_from_recording() {
    let output = unipulse_cmd()
        .arg("--input")
        .arg(fixture("uap_vaps.json"))
        .args(["ssids", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let json = stdout_json(&output);
    let nets = json.as_array().unwrap();
    assert_eq!(nets.len(), 2, "idle IoT network is hidden");

    let home = &nets[0];
    assert_eq!(home["name"], "HomeNet");
    assert_eq!(home["client_count"], 16);
    assert_eq!(home["aps"], serde_json::json!(["Living Room", "Office"]));
    assert_eq!(home["channels"]["2.4"], serde_json::json!([6]));
    assert_eq!(home["channels"]["5"], serde_json::json!([36]));
    assert_eq!(home["avg_satisfaction"], 93.0);
    assert_eq!(home["avg_signal"], -58.0);

    let visitors = &nets[1];
    assert_eq!(visitors["is_guest"], true);
    assert!(visitors["avg_satisfaction"].is_null());
    assert!(visitors["avg_signal"].is_null());
}

#[test]
fn test_ssids_include_idle_sorted_by_name() {
    unipulse_cmd()
        .arg("--input")
        .arg(fixture("uap_vaps.json"))
        .args(["ssids", "--include-idle", "--sort", "name", "--asc", "-o", "plain"])
        .assert()
        .success()
        .stdout("HomeNet\nIoT\nVisitors\n");
}

#[test]
fn test_trend_from_recording() {
    let output = unipulse_cmd()
        .arg("--input")
        .arg(fixture("wan_rates.json"))
        .args(["trend", "--range", "1h", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let json = stdout_json(&output);
    assert_eq!(json["interval"], "2m");
    assert_eq!(json["entities"], serde_json::json!(["eth0", "eth2"]));
    let points = json["points"].as_array().unwrap();
    assert_eq!(points.len(), 2, "all-zero bucket is dropped");
    assert_eq!(points[0]["eth2_rx_bytes-r"], 1000.0);
    assert!(points[1].get("eth2_rx_bytes-r").is_none());
    assert_eq!(json["summary"]["rx_bytes-r"]["current"], 251_000.0);
    assert_eq!(json["summary"]["rx_bytes-r"]["entities"], 2);
}

#[test]
fn test_unreadable_recording() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{ not json").unwrap();

    let output = unipulse_cmd()
        .arg("--input")
        .arg(&bad)
        .arg("ssids")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("Invalid JSON input"));
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_no_store_configured() {
    let output = unipulse_cmd().arg("traffic").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("No store configured"), "{text}");
}

#[test]
fn test_unknown_profile() {
    let output = unipulse_cmd()
        .args(["--profile", "lab", "ssids"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("Profile 'lab' not found"));
}

#[test]
fn test_config_init_show_and_path() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("nested").join("config.toml");

    unipulse_cmd()
        .arg("--config")
        .arg(&cfg)
        .args([
            "config",
            "init",
            "--store-url",
            "http://10.0.0.5:8086",
            "--username",
            "grafana",
            "--password-env",
            "HOME_STORE_PW",
        ])
        .assert()
        .success();

    let text = std::fs::read_to_string(&cfg).unwrap();
    assert!(text.contains("[profiles.default]"), "{text}");
    assert!(text.contains("http://10.0.0.5:8086"), "{text}");

    unipulse_cmd()
        .arg("--config")
        .arg(&cfg)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    let output = unipulse_cmd()
        .arg("--config")
        .arg(&cfg)
        .args(["config", "show", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let json = stdout_json(&output);
    assert_eq!(json["active_profile"], "default");
    assert_eq!(json["config"]["profiles"]["default"]["username"], "grafana");

    // A second init without --force refuses to clobber the profile.
    unipulse_cmd()
        .arg("--config")
        .arg(&cfg)
        .args(["config", "init", "--store-url", "http://10.0.0.6:8086"])
        .assert()
        .code(2);

    unipulse_cmd()
        .arg("--config")
        .arg(&cfg)
        .args(["config", "init", "--store-url", "http://10.0.0.6:8086", "--force"])
        .assert()
        .success();
    assert!(std::fs::read_to_string(&cfg).unwrap().contains("10.0.0.6"));
}

#[test]
fn test_config_defaults_apply() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("config.toml");
    std::fs::write(&cfg, "[defaults]\noutput = \"json\"\nrange = \"6h\"\n").unwrap();

    let output = unipulse_cmd()
        .arg("--config")
        .arg(&cfg)
        .args(["query", "rates"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let json = stdout_json(&output);
    assert_eq!(json["interval"], "10m");
    assert!(json["query"].as_str().unwrap().contains("now() - 6h"));
}

#[test]
fn test_invalid_config_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("config.toml");
    std::fs::write(&cfg, "[intervals]\n\"1h\" = \"1m; DROP\"\n").unwrap();

    unipulse_cmd()
        .arg("--config")
        .arg(&cfg)
        .args(["query", "rates"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("intervals.1h"));
}

// ── Live store ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_traffic_against_store() {
    let server = MockServer::start().await;
    let body = std::fs::read_to_string(fixture("client_totals.json")).unwrap();
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("db", "telemetry"))
        .and(query_param("epoch", "ms"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let output = unipulse_cmd()
        .args(["--url", &server.uri(), "--database", "telemetry"])
        .args(["traffic", "--range", "1h", "-o", "plain"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).lines().count(),
        3
    );

    let requests = server.received_requests().await.unwrap();
    let statement = requests[0]
        .url
        .query_pairs()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert!(statement.contains("time > now() - 1h"), "{statement}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_credentials_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(401).set_body_string(r#"{"error":"authorization failed"}"#),
        )
        .mount(&server)
        .await;

    let output = unipulse_cmd()
        .args(["--url", &server.uri(), "ssids"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("Authentication failed"));
}
