//! The `nodeup` binary: argument handling and configuration errors.
//!
//! None of these runs reaches the network.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn nodeup() -> Command {
    let mut cmd = Command::cargo_bin("nodeup").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("NODEUP_CONFIG");
    cmd
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_help_lists_options() {
    nodeup()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--bitcoind-only"))
        .stdout(predicate::str::contains("--lnd-only"))
        .stdout(predicate::str::contains("--skip-tests"))
        .stdout(predicate::str::contains("--restart"))
        .stdout(predicate::str::contains("--continue-on-error"));
}

#[test]
fn test_only_one_daemon_selector() {
    nodeup()
        .args(["-b", "-l"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_missing_config_file() {
    let temp = TempDir::new().unwrap();
    nodeup()
        .arg("--config")
        .arg(temp.path().join("absent.toml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("Failed to read config"));
}

#[test]
fn test_unknown_config_key() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "bitcoin_dir = \"/opt/bitcoin\"\n");
    nodeup()
        .env("NODEUP_CONFIG", &config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_zero_poll_interval_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "[polling]\ninterval_ms = 0\n");
    nodeup()
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_missing_gpg() {
    let temp = TempDir::new().unwrap();
    let config = write_config(
        temp.path(),
        &format!(
            "home = \"{}\"\ngpg = \"/nonexistent/gpg\"\n",
            temp.path().join("home").display()
        ),
    );
    nodeup()
        .arg("--config")
        .arg(&config)
        .arg("--no-progress")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Required tool '/nonexistent/gpg'"));

    // the cache directory is created before any tool is needed
    assert!(temp.path().join("home/tars").is_dir());
}
