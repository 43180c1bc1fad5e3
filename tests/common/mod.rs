//! Shared test utilities for integration and E2E tests.
//!
//! This module provides a fixture holding a `group-index.yaml` and a
//! storage tree, plus helpers for building the library's services over it.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new()
//!         .with_config(configs::PUBLIC_GROUP)
//!         .with_artifact("hosted:releases", "org/x/1.0/x-1.0.jar");
//!     fixture.command().args(["ls", "group:public"]).assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// Common configuration files for testing.
#[allow(dead_code)]
pub mod configs {
    /// Two hosted repositories and a remote behind one group.
    pub const PUBLIC_GROUP: &str = r#"
storage_root: storage
repositories:
  - type: hosted
    name: releases
  - type: hosted
    name: snapshots
  - type: remote
    name: central
    url: https://repo.example.org/maven2
  - type: group
    name: public
    members: ["hosted:releases", "hosted:snapshots", "remote:central"]
"#;

    /// Nested groups sharing a hosted member.
    pub const NESTED_GROUPS: &str = r#"
storage_root: storage
repositories:
  - type: hosted
    name: releases
  - type: hosted
    name: thirdparty
  - type: group
    name: inner
    members: ["hosted:releases"]
  - type: group
    name: outer
    members: ["group:inner", "hosted:thirdparty", "hosted:releases"]
"#;

    /// A group referencing a repository that is not declared.
    pub const UNKNOWN_MEMBER: &str = r#"
repositories:
  - type: group
    name: broken
    members: ["hosted:missing"]
"#;
}

/// A temporary directory holding `group-index.yaml` and a `storage/` tree.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `group-index.yaml` with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child("group-index.yaml")
            .write_str(content)
            .expect("Failed to write config file");
        self
    }

    /// Store an artifact in a repository given as `type:name`.
    pub fn with_artifact(self, repository: &str, path: &str) -> Self {
        self.write_artifact(repository, path, path);
        self
    }

    /// Store an artifact with explicit content.
    pub fn write_artifact(&self, repository: &str, path: &str, content: &str) {
        let (repo_type, name) = repository
            .split_once(':')
            .expect("repository must be type:name");
        self.temp_dir
            .child("storage")
            .child(format!("{}-{}", repo_type, name))
            .child(path)
            .write_str(content)
            .expect("Failed to write artifact");
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("group-index.yaml")
    }

    pub fn storage_root(&self) -> PathBuf {
        self.temp_dir.path().join("storage")
    }

    /// Create a command configured to run in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("group-index");
        cmd.current_dir(self.path())
            .env_remove("GROUP_INDEX_CONFIG")
            .env_remove("GROUP_INDEX_STORAGE")
            .env_remove("RUST_LOG")
            .arg("--color")
            .arg("never");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
