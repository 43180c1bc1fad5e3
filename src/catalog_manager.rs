//! Catalog lifecycle per repository
//!
//! The manager knows where each repository's catalog lives and hands out
//! open `Catalog` handles. It also owns the sync marker, a small file in the
//! index directory recording that a remote repository has completed its
//! first full sync.

use chrono::{DateTime, Utc};
use log::error;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogSummary, PathFilter};
use crate::content::{ContentStore, INDEX_DIR};
use crate::error::{Error, Result};
use crate::store::RepositoryKey;

/// Marker file recording the last completed remote sync.
pub const SYNC_MARKER_FILE: &str = "sync.properties";

const MARKER_TIMESTAMP: &str = "timestamp=";

/// Opens catalogs and tracks sync markers
pub struct CatalogManager {
    content: Arc<dyn ContentStore>,
    filter: PathFilter,
}

impl CatalogManager {
    pub fn new(content: Arc<dyn ContentStore>, filter: PathFilter) -> Self {
        Self { content, filter }
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    /// The repository's `.index` directory.
    pub fn index_dir(&self, key: &RepositoryKey) -> PathBuf {
        self.content.storage_root(key).join(INDEX_DIR)
    }

    /// Whether the repository has a committed catalog.
    pub fn catalog_exists(&self, key: &RepositoryKey) -> bool {
        Catalog::exists_at(&self.index_dir(key))
    }

    /// Committed catalog contents for `key`, read without taking the lock.
    pub fn summary(&self, key: &RepositoryKey) -> Result<Option<CatalogSummary>> {
        Catalog::summary(key, &self.index_dir(key))
    }

    /// Open (or create) the catalog for `key`.
    pub fn open(&self, key: &RepositoryKey) -> Result<Catalog> {
        let root = self.content.storage_root(key);
        Catalog::open(key, &root, &root.join(INDEX_DIR))
    }

    /// Open the catalog for `key`, logging and swallowing any failure.
    ///
    /// A `None` means the repository is unavailable for the current pass.
    pub fn open_or_log(&self, key: &RepositoryKey) -> Option<Catalog> {
        match self.open(key) {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                error!("Failed to create indexing context for: {}. Reason: {}", key, e);
                None
            }
        }
    }

    /// Close a catalog, logging a failure to release it.
    pub fn close(&self, catalog: Catalog) {
        let key = catalog.key().clone();
        if let Err(e) = catalog.close() {
            error!("Failed to close indexing context for: {}. Reason: {}", key, e);
        }
    }

    pub fn has_sync_marker(&self, key: &RepositoryKey) -> bool {
        self.index_dir(key).join(SYNC_MARKER_FILE).is_file()
    }

    /// Timestamp stored in the sync marker, if any.
    pub fn read_sync_marker(&self, key: &RepositoryKey) -> Result<Option<DateTime<Utc>>> {
        let file = self.index_dir(key).join(SYNC_MARKER_FILE);
        let content = match fs::read_to_string(&file) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .find_map(|line| line.strip_prefix(MARKER_TIMESTAMP))
            .and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
            .map(|t| t.with_timezone(&Utc)))
    }

    /// Record a completed sync.
    pub fn write_sync_marker(&self, key: &RepositoryKey, timestamp: DateTime<Utc>) -> Result<()> {
        let dir = self.index_dir(key);
        fs::create_dir_all(&dir)?;
        fs::write(
            dir.join(SYNC_MARKER_FILE),
            format!("{}{}\n", MARKER_TIMESTAMP, timestamp.to_rfc3339()),
        )
        .map_err(|e| Error::RemoteSync {
            key: key.clone(),
            message: format!("cannot write sync marker: {}", e),
        })
    }
}
