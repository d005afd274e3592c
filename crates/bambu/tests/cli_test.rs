//! Integration tests for the `bambu` CLI binary.
//!
//! These tests cover argument parsing, help output, shell completions,
//! config handling, and error exit codes without a printer on the network.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `bambu` binary with env isolation.
///
/// Clears all `BAMBU_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn bambu_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("bambu");
    cmd.env("HOME", "/tmp/bambu-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/bambu-cli-test-nonexistent")
        .env_remove("BAMBU_CONFIG")
        .env_remove("BAMBU_IP")
        .env_remove("BAMBU_SERIAL")
        .env_remove("BAMBU_ACCESS_CODE")
        .env_remove("BAMBU_OUTPUT")
        .env_remove("BAMBU_LOG_FILE")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(
        &path,
        r#"
[printer]
ip = "192.168.1.50"
serial = "01S00A123456789"
access_code = "12345678"

[monitor]
refresh_interval_secs = 20
"#,
    )
    .unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = bambu_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    bambu_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("Bambu Lab")
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    bambu_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bambu"));
}

#[test]
fn test_invalid_subcommand() {
    bambu_cmd()
        .arg("frobnicate")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_invalid_output_format() {
    bambu_cmd()
        .args(["status", "-o", "xml"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("invalid value"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    bambu_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bambu"));
}

#[test]
fn test_completions_zsh() {
    bambu_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef bambu"));
}

#[test]
fn test_completions_fish() {
    bambu_cmd()
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Missing configuration ───────────────────────────────────────────

#[test]
fn test_status_without_config_points_at_init() {
    let dir = tempfile::tempdir().unwrap();
    let output = bambu_cmd()
        .args(["--config"])
        .arg(dir.path().join("missing.toml"))
        .arg("status")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3), "Expected auth exit code");
    let text = combined_output(&output);
    assert!(text.contains("not configured"), "Unexpected output:\n{text}");
    assert!(text.contains("bambu config init"), "Missing hint:\n{text}");
}

#[test]
fn test_watch_without_serial_reports_field() {
    let dir = tempfile::tempdir().unwrap();
    let output = bambu_cmd()
        .args(["--ip", "192.168.1.50", "--config"])
        .arg(dir.path().join("missing.toml"))
        .arg("watch")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("serial"));
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn test_config_path_follows_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    bambu_cmd()
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_path_follows_env() {
    bambu_cmd()
        .env("BAMBU_CONFIG", "/tmp/bambu-env/config.toml")
        .args(["config", "path"])
        .assert()
        .success()
        .stdout("/tmp/bambu-env/config.toml\n");
}

#[test]
fn test_config_show_masks_access_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());

    let output = bambu_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    insta::assert_snapshot!(stdout, @r#"
    [printer]
    ip = "192.168.1.50"
    serial = "01S00A123456789"
    access_code = "****"
    insecure_trust_all_certificates = true

    [monitor]
    refresh_interval_secs = 20
    connect_timeout_secs = 10
    keep_alive_secs = 30
    fetch_version = true
    "#);
}

#[test]
fn test_config_show_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());

    let output = bambu_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "show", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["printer"]["access_code"], "****");
    assert_eq!(value["printer"]["serial"], "01S00A123456789");
    assert_eq!(value["monitor"]["refresh_interval_secs"], 20);
}

#[test]
fn test_set_code_plaintext_writes_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    bambu_cmd()
        .arg("--config")
        .arg(&path)
        .args(["--serial", "01S00A123456789", "--access-code", "87654321"])
        .args(["config", "set-code", "--plaintext"])
        .assert()
        .success();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("serial = \"01S00A123456789\""));
    assert!(written.contains("access_code = \"87654321\""));
}

#[test]
fn test_set_code_without_serial_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = bambu_cmd()
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .args(["--access-code", "87654321", "config", "set-code", "--plaintext"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("serial"));
}
