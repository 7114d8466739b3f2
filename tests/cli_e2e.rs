//! End-to-end CLI tests for the sitemirror binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Command with an isolated config directory so a user config is never read.
fn sitemirror(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sitemirror").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    sitemirror(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Refresh a local directory tree"))
        .stdout(predicate::str::contains("--dynamic-referer"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    sitemirror(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sitemirror"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    sitemirror(&home)
        .args(["./site", "https://h/", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_missing_roots_returns_error() {
    let home = TempDir::new().unwrap();
    sitemirror(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("LOCAL_ROOT"));
}

#[test]
fn test_binary_invalid_remote_root_returns_error() {
    let home = TempDir::new().unwrap();
    let site = TempDir::new().unwrap();
    sitemirror(&home)
        .arg(site.path())
        .arg("ftp://files.example.com/site")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid remote root"));
}

#[test]
fn test_binary_missing_local_dir_finishes_with_report() {
    let home = TempDir::new().unwrap();
    let site = TempDir::new().unwrap();
    sitemirror(&home)
        .arg(site.path().join("missing"))
        .args(["https://cdn.example.com/site", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 0"))
        .stdout(predicate::str::contains("\"percent\": 100"))
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_binary_empty_dir_reports_no_files() {
    let home = TempDir::new().unwrap();
    let site = TempDir::new().unwrap();
    sitemirror(&home)
        .arg(site.path())
        .arg("https://cdn.example.com/site")
        .assert()
        .success()
        .stderr(predicate::str::contains("No files found in the local directory."))
        .stdout(predicate::str::contains("Refreshed 0/0 file(s) (100%)"));
}

#[test]
fn test_binary_invalid_config_file_returns_error() {
    let home = TempDir::new().unwrap();
    let site = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    fs::write(&config, "concurrency = 500\n").unwrap();

    sitemirror(&home)
        .arg(site.path())
        .arg("https://cdn.example.com/site")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_binary_invalid_header_returns_error() {
    let home = TempDir::new().unwrap();
    let site = TempDir::new().unwrap();
    sitemirror(&home)
        .arg(site.path())
        .args(["https://cdn.example.com/site", "-H", "no-colon-here"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Name: Value"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_binary_mirrors_files_and_prints_json_summary() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote".to_vec()))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let site = TempDir::new().unwrap();
    fs::create_dir_all(site.path().join("img")).unwrap();
    fs::write(site.path().join("img/a.png"), b"local").unwrap();
    fs::write(site.path().join("b.jpg"), b"local").unwrap();
    fs::write(site.path().join("readme.md"), b"local").unwrap();

    let remote = format!("{}/assets", server.uri());
    let site_path = site.path().to_path_buf();
    let assert = tokio::task::spawn_blocking(move || {
        sitemirror(&home)
            .arg(&site_path)
            .arg(&remote)
            .args(["--json", "-c", "2", "-r", "0", "--no-progress"])
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("\"completed\": 2"))
        .stdout(predicate::str::contains("\"http_failures\": 0"));
    assert_eq!(fs::read(site.path().join("img/a.png")).unwrap(), b"remote");
    assert_eq!(fs::read(site.path().join("readme.md")).unwrap(), b"local");
}
