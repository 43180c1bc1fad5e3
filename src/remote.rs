//! Remote catalog updates
//!
//! A remote repository's catalog is refreshed from a `RemoteSyncSource`
//! rather than by rescanning. The source answers "what changed since this
//! timestamp": nothing, a set of changes, or a full replacement.
//!
//! `CachedContentSource` derives those answers from the content a remote
//! repository has already cached locally, so it needs no network access.
//! Changes are found by comparing the cache with the remote's committed
//! catalog: new paths, paths whose size or modification time moved, and
//! paths that were evicted. Cached files often keep the upstream
//! modification time, so a file newer than `since` is not the only signal.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::{collect_entries, Catalog, CatalogEntry, PathFilter};
use crate::content::{ContentStore, INDEX_DIR};
use crate::error::Result;
use crate::store::RepositoryKey;

/// What a remote reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    /// Nothing changed since the given timestamp
    None,
    /// Changed entries plus removed paths
    Incremental {
        changed: Vec<CatalogEntry>,
        removed: Vec<String>,
    },
    /// The complete catalog
    Full(Vec<CatalogEntry>),
}

/// Answer to a catalog update request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogUpdate {
    pub kind: UpdateKind,
    /// Point in time the remote's catalog reflects
    pub timestamp: Option<DateTime<Utc>>,
}

impl CatalogUpdate {
    pub fn up_to_date(timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            kind: UpdateKind::None,
            timestamp,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self.kind, UpdateKind::Full(_))
    }
}

/// Trait for remote catalog sync - allows mocking in tests
pub trait RemoteSyncSource: Send + Sync {
    /// Fetch what changed in `member`'s catalog since `since`.
    fn fetch_catalog_update(
        &self,
        member: &RepositoryKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<CatalogUpdate>;
}

/// Builds catalog updates from a remote repository's local cache
pub struct CachedContentSource {
    content: Arc<dyn ContentStore>,
    filter: PathFilter,
}

impl CachedContentSource {
    pub fn new(content: Arc<dyn ContentStore>, filter: PathFilter) -> Self {
        Self { content, filter }
    }
}

impl RemoteSyncSource for CachedContentSource {
    fn fetch_catalog_update(
        &self,
        member: &RepositoryKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<CatalogUpdate> {
        let root = self.content.storage_root(member);
        let entries = collect_entries(member, &root, &self.filter)?;
        let newest_stamp = entries
            .values()
            .map(|e| e.modified)
            .max()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        let committed = match since {
            Some(_) => Catalog::committed_entries(member, &root.join(INDEX_DIR))?,
            None => None,
        };
        let (Some(since), Some(committed)) = (since, committed) else {
            return Ok(CatalogUpdate {
                kind: UpdateKind::Full(entries.into_values().collect()),
                timestamp: newest_stamp.or_else(|| Some(Utc::now())),
            });
        };

        let mut known: BTreeMap<String, CatalogEntry> = committed
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect();
        let mut changed = Vec::new();
        for entry in entries.into_values() {
            match known.remove(&entry.path) {
                Some(old) if old.size == entry.size && old.modified == entry.modified => {}
                _ => changed.push(entry),
            }
        }
        let removed: Vec<String> = known.into_keys().collect();

        if changed.is_empty() && removed.is_empty() {
            return Ok(CatalogUpdate::up_to_date(Some(since)));
        }

        // Must move past `since`, or the update would read as a no-op.
        let timestamp = newest_stamp
            .filter(|t| *t > since)
            .unwrap_or_else(|| Utc::now().max(since + Duration::milliseconds(1)));
        Ok(CatalogUpdate {
            kind: UpdateKind::Incremental { changed, removed },
            timestamp: Some(timestamp),
        })
    }
}
