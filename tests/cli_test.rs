use assert_cmd::cargo;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_cli_help() {
    let mut cmd = cargo::cargo_bin_cmd!("sitelens");
    let assert = cmd.arg("--help").assert();

    assert
        .success()
        .stderr(predicate::str::is_empty())
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("pagespeed"));
}

#[test]
fn test_cli_version() {
    let mut cmd = cargo::cargo_bin_cmd!("sitelens");
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_analyze_help_lists_options() {
    let mut cmd = cargo::cargo_bin_cmd!("sitelens");
    cmd.args(["analyze", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--keyword"))
        .stdout(predicate::str::contains("--competitor"))
        .stdout(predicate::str::contains("--skip-pagespeed"))
        .stdout(predicate::str::contains("--quick-security"))
        .stdout(predicate::str::contains("--no-ai"));
}

#[test]
fn test_analyze_requires_url() {
    let mut cmd = cargo::cargo_bin_cmd!("sitelens");
    cmd.arg("analyze")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<URL>"));
}

#[test]
fn test_missing_subcommand_fails() {
    let mut cmd = cargo::cargo_bin_cmd!("sitelens");
    cmd.assert().failure();
}

#[test]
fn test_json_error_without_keywords() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("data").join("sitelens.db");

    let mut cmd = cargo::cargo_bin_cmd!("sitelens");
    cmd.args(["--output", "json", "--db"])
        .arg(&db)
        .args(["analyze", "example.no"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"code\": \"NO_KEYWORDS\""))
        .stderr(predicate::str::contains("Error:"));

    // The database directory is created even when validation fails
    assert!(db.exists());
}

#[test]
fn test_json_error_for_invalid_url() {
    let dir = tempdir().unwrap();

    let mut cmd = cargo::cargo_bin_cmd!("sitelens");
    cmd.args(["-o", "json", "--db"])
        .arg(dir.path().join("sitelens.db"))
        .args(["analyze", "ftp://example.no", "-k", "bilvask"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"code\": \"INVALID_URL\""));
}

#[test]
fn test_pagespeed_for_unknown_analysis() {
    let dir = tempdir().unwrap();

    let mut cmd = cargo::cargo_bin_cmd!("sitelens");
    cmd.args(["pagespeed", "no-such-analysis", "--output", "json", "--db"])
        .arg(dir.path().join("sitelens.db"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"code\": \"NOT_FOUND\""));
}

#[test]
fn test_text_mode_errors_go_to_stderr() {
    let dir = tempdir().unwrap();

    let mut cmd = cargo::cargo_bin_cmd!("sitelens");
    cmd.arg("--db")
        .arg(dir.path().join("sitelens.db"))
        .args(["analyze", "example.no", "--keyword", "   "])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Sitelens - Website Analyzer"))
        .stdout(predicate::str::contains("NO_KEYWORDS").not())
        .stderr(predicate::str::contains("keyword"));
}
