//! End-to-end tests for CLI exit codes.
//!
//! - Exit code 0: Success
//! - Exit code 1: General error (missing config, lookup failure, not found)
//! - Exit code 2: Invalid command-line usage (handled by clap)

mod common;

use common::prelude::*;

#[test]
fn test_exit_code_help() {
    let mut cmd = cargo_bin_cmd!("group-index");
    cmd.arg("--help").assert().code(0);
}

#[test]
fn test_exit_code_version() {
    let mut cmd = cargo_bin_cmd!("group-index");
    cmd.arg("--version")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("group-index"));
}

#[test]
fn test_exit_code_config_not_found() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("info")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_exit_code_invalid_config_has_hint() {
    let fixture = TestFixture::new().with_config(configs::UNKNOWN_MEMBER);

    fixture
        .command()
        .arg("info")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("hosted:missing"))
        .stderr(predicate::str::contains("hint"));
}

#[test]
fn test_config_from_environment() {
    let fixture = TestFixture::new().with_config(configs::PUBLIC_GROUP);
    let elsewhere = assert_fs::TempDir::new().unwrap();

    fixture
        .command()
        .current_dir(elsewhere.path())
        .env("GROUP_INDEX_CONFIG", fixture.config_path())
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("remote:central"));
}

#[test]
fn test_exit_code_unknown_subcommand() {
    let mut cmd = cargo_bin_cmd!("group-index");
    cmd.arg("frobnicate").assert().code(2);
}
