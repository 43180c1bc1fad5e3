//! End-to-end tests for the `reindex` command.

mod common;

use common::prelude::*;

#[test]
fn test_reindex_group_writes_aggregate_catalog() {
    let fixture = TestFixture::new()
        .with_config(configs::PUBLIC_GROUP)
        .with_artifact("hosted:releases", "org/a/a.jar")
        .with_artifact("hosted:releases", "org/a/a.jar.sha1")
        .with_artifact("remote:central", "org/c/c.jar");

    fixture
        .command()
        .args(["reindex", "group:public"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged group:public (3 members)"));

    let catalog = fixture.storage_root().join("group-public/.index/catalog.json");
    let json = std::fs::read_to_string(catalog).unwrap();
    assert!(json.contains("org/a/a.jar"));
    assert!(json.contains("org/c/c.jar"));
    assert!(!json.contains("a.jar.sha1"));
    assert!(fixture
        .storage_root()
        .join("remote-central/.index/sync.properties")
        .exists());
}

#[test]
fn test_reindex_all_then_info_shows_catalogs() {
    let fixture = TestFixture::new()
        .with_config(configs::PUBLIC_GROUP)
        .with_artifact("hosted:releases", "org/a/a.jar");

    fixture.command().args(["reindex", "--all"]).assert().success();

    fixture
        .command()
        .args(["info", "--type", "group"])
        .assert()
        .success()
        .stdout(predicate::str::contains("group:public 1 entries"));
}

#[test]
fn test_reindex_requires_keys_or_all() {
    let fixture = TestFixture::new().with_config(configs::PUBLIC_GROUP);

    fixture.command().arg("reindex").assert().code(2);
}

#[test]
fn test_reindex_logs_remote_outcome() {
    let fixture = TestFixture::new()
        .with_config(configs::PUBLIC_GROUP)
        .with_artifact("remote:central", "org/c/c.jar");

    fixture.command().args(["reindex", "group:public"]).assert().success();

    fixture
        .command()
        .args(["reindex", "group:public"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Up to date: remote:central"))
        .stderr(predicate::str::contains(
            "NO index update for: remote:central. Index is up-to-date.",
        ));
}
