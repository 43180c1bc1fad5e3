//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `group-index` command-line tool, one file per command.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments, derived
//!   using `clap`.
//! - An `execute` function that takes the parsed `Args` and the shared
//!   `Context` and performs the command's logic.
//!
//! `Context` carries what every command needs: the loaded configuration,
//! the resolved storage root and the output styler.

pub mod info;
pub mod ls;
pub mod reindex;
pub mod resolve;
pub mod tree;

use anyhow::{anyhow, Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use group_index::catalog_manager::CatalogManager;
use group_index::config::Config;
use group_index::content::FileContentStore;
use group_index::output::Styler;
use group_index::registry::MemoryRegistry;

/// Everything a command needs from the global options
pub struct Context {
    pub config_path: PathBuf,
    pub config: Config,
    pub storage_root: PathBuf,
    pub styler: Styler,
}

impl Context {
    /// Load the configuration file. `storage` overrides its `storage_root`.
    pub fn load(config_path: &Path, storage: Option<PathBuf>, styler: Styler) -> Result<Self> {
        if !config_path.exists() {
            return Err(anyhow!(
                "Configuration file not found: {}\n  hint: create it or pass --config <FILE> (GROUP_INDEX_CONFIG)",
                config_path.display()
            ));
        }
        let config = Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
        let storage_root = storage.unwrap_or_else(|| config.storage_root());

        Ok(Self {
            config_path: config_path.to_path_buf(),
            config,
            storage_root,
            styler,
        })
    }

    pub fn registry(&self) -> Result<Arc<MemoryRegistry>> {
        Ok(Arc::new(self.config.build_registry()?))
    }

    pub fn content(&self) -> Arc<FileContentStore> {
        Arc::new(FileContentStore::new(self.storage_root.clone()))
    }

    pub fn catalogs(&self) -> Result<CatalogManager> {
        Ok(CatalogManager::new(self.content(), self.config.path_filter()?))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) const CONFIG: &str = r#"
storage_root: storage
repositories:
  - type: hosted
    name: releases
  - type: hosted
    name: snapshots
  - type: remote
    name: central
  - type: group
    name: public
    members: ["hosted:releases", "hosted:snapshots", "remote:central"]
  - type: group
    name: all
    members: ["group:public"]
"#;

    /// Temp directory holding `group-index.yaml` and a storage tree
    pub(crate) fn context_with(files: &[(&str, &str)]) -> (TempDir, Context) {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("group-index.yaml");
        std::fs::write(&config_path, CONFIG).unwrap();
        for (repo_dir, path) in files {
            let file = temp.path().join("storage").join(repo_dir).join(path);
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(&file, path).unwrap();
        }
        let ctx = Context::load(&config_path, None, Styler::plain()).unwrap();
        (temp, ctx)
    }

    #[test]
    fn test_load_resolves_storage_relative_to_config() {
        let (temp, ctx) = context_with(&[]);
        assert_eq!(ctx.storage_root, temp.path().join("storage"));
        assert_eq!(ctx.config.repositories.len(), 5);
    }

    #[test]
    fn test_storage_flag_overrides_config() {
        let (temp, _) = context_with(&[]);
        let ctx = Context::load(
            &temp.path().join("group-index.yaml"),
            Some(PathBuf::from("/elsewhere")),
            Styler::plain(),
        )
        .unwrap();
        assert_eq!(ctx.storage_root, PathBuf::from("/elsewhere"));
    }

    #[test]
    fn test_missing_config_has_hint() {
        let err = Context::load(Path::new("/nonexistent/group-index.yaml"), None, Styler::plain())
            .err()
            .unwrap();
        assert!(err.to_string().contains("hint"));
    }
}
