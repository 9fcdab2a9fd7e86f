//! CLI integration tests for ora-pg-sync.
//!
//! These tests verify command-line argument parsing, help output, log file
//! rotation and exit codes for errors raised before any database is reached.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::TempDir;

/// Get a command for the ora-pg-sync binary.
fn cmd() -> Command {
    Command::cargo_bin("ora-pg-sync").unwrap()
}

/// Command logging into a scratch directory.
fn cmd_in(dir: &TempDir) -> Command {
    let mut c = cmd();
    c.current_dir(dir.path())
        .arg("--log-file")
        .arg(dir.path().join("sync.log"));
    c
}

fn config_file(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", body).unwrap();
    file
}

const VALID: &str = r#"
oracle:
  user: scott
  password: tiger
  connect_string: "db:1521/ORCL"
postgres:
  host: localhost
  database: target
  user: loader
  password: secret
"#;

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("copy"))
        .stdout(predicate::str::contains("seq-fix"))
        .stdout(predicate::str::contains("fk-drop"))
        .stdout(predicate::str::contains("cmp-tab-list"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_copy_subcommand_help() {
    cmd()
        .args(["copy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--use-copy"))
        .stdout(predicate::str::contains("--binary-col"))
        .stdout(predicate::str::contains("--truncate-tables"))
        .stdout(predicate::str::contains("--disable-triggers"))
        .stdout(predicate::str::contains("--processes"))
        .stdout(predicate::str::contains("--skip-count"))
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ora-pg-sync"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--table-list"))
        .stdout(predicate::str::contains("--exclude-list"))
        .stdout(predicate::str::contains("--replace-query"))
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_log_flags_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: ora-pg-sync.log]"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    let dir = TempDir::new().unwrap();
    cmd_in(&dir)
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let dir = TempDir::new().unwrap();
    let file = config_file("invalid: yaml: content: [\n");
    cmd_in(&dir)
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_fields_exits_with_code_2() {
    let dir = TempDir::new().unwrap();
    let file = config_file("oracle:\n  user: scott\n");
    cmd_in(&dir)
        .args(["--config", file.path().to_str().unwrap(), "seq-fix"])
        .assert()
        .code(2);
}

#[test]
fn test_malformed_replace_query_exits_with_code_2() {
    let dir = TempDir::new().unwrap();
    let file = config_file(VALID);
    cmd_in(&dir)
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--replace-query",
            "PARENT select * from PARENT",
            "cmp",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("table[query]"));
}

#[test]
fn test_copy_mode_toward_oracle_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&format!("direction: pg_to_ora\n{}", VALID));
    cmd_in(&dir)
        .args(["--config", file.path().to_str().unwrap(), "copy", "--use-copy"])
        .assert()
        .code(2);
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = config_file(VALID);
    cmd_in(&dir)
        .args(["--config", file.path().to_str().unwrap(), "copy", "--batch-size", "0"])
        .assert()
        .code(2);
}

// =============================================================================
// Log File Tests
// =============================================================================

#[test]
fn test_existing_log_file_is_rotated() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("sync.log"), "previous run\n").unwrap();

    cmd_in(&dir)
        .args(["--config", "missing.yaml", "cmp"])
        .assert()
        .failure();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.contains(&"sync.log".to_string()));
    assert!(names
        .iter()
        .any(|n| n.starts_with("sync.") && n.ends_with(".log") && n != "sync.log"));
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
