//! End-to-end tests for the `ls` command.

mod common;

use common::prelude::*;

#[test]
fn test_ls_group_root_is_union() {
    let fixture = TestFixture::new()
        .with_config(configs::PUBLIC_GROUP)
        .with_artifact("hosted:releases", "com/a/a.jar")
        .with_artifact("remote:central", "org/b/b.jar");

    fixture
        .command()
        .args(["ls", "group:public"])
        .assert()
        .success()
        .stdout("com\norg\n");
}

#[test]
fn test_ls_count() {
    let fixture = TestFixture::new()
        .with_config(configs::PUBLIC_GROUP)
        .with_artifact("hosted:releases", "org/a/1.0/a.jar")
        .with_artifact("hosted:snapshots", "org/a/2.0-SNAPSHOT/a.jar")
        .with_artifact("remote:central", "org/a/1.0/a.pom");

    fixture
        .command()
        .args(["ls", "group:public", "/org/a", "--count"])
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn test_ls_missing_folder_is_empty() {
    let fixture = TestFixture::new().with_config(configs::PUBLIC_GROUP);

    fixture
        .command()
        .args(["ls", "group:public", "/nothing/here"])
        .assert()
        .success()
        .stdout("");
}
