//! # Repository Catalogs
//!
//! A catalog is the searchable index of one repository's artifacts, kept
//! apart from the artifacts themselves in the repository's `.index/`
//! directory.
//!
//! ## Format
//!
//! - `.index/catalog.json` holds the last committed snapshot: a timestamp and
//!   a list of entries. Every entry names the repository that contributed
//!   it, so a group's aggregate catalog is simply the union of its members'
//!   entries, grouped by source.
//! - `.index/write.lock` carries an exclusive advisory lock for as long as a
//!   catalog is open. The file itself may outlive its holder; only the lock
//!   counts, and the OS drops it when the holding process exits.
//!
//! ## Lifecycle
//!
//! `open` → (`scan` | `merge_from` | `apply_changes` | `retain_sources`)* →
//! `commit` → `close`. Changes are staged in memory and only become visible
//! on `commit`, which replaces the snapshot atomically (temp file + rename).
//! Dropping a `Catalog` without calling `close` still releases the lock.
//! The holder writes its process id into the lock file for diagnostics.
//!
//! Merging is per source: merging a member's catalog replaces everything
//! previously contributed by that member in one step, so an aggregate never
//! holds half of a member.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use glob::Pattern;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use crate::content::INDEX_DIR;
use crate::error::{Error, Result};
use crate::store::RepositoryKey;

/// Committed snapshot file inside the index directory.
pub const CATALOG_FILE: &str = "catalog.json";

/// Lock file guarding an open catalog.
pub const LOCK_FILE: &str = "write.lock";

/// One indexed artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Repository-relative path
    pub path: String,
    /// Repository that holds the artifact
    pub source: RepositoryKey,
    pub size: u64,
    /// Modification time in milliseconds since the epoch
    pub modified: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    id: String,
    timestamp: Option<DateTime<Utc>>,
    entries: Vec<CatalogEntry>,
}

/// Read-only view of a committed catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSummary {
    pub timestamp: Option<DateTime<Utc>>,
    pub entries: usize,
    /// Contributing repositories with their entry counts
    pub sources: BTreeMap<RepositoryKey, usize>,
}

/// Decides which repository paths are worth indexing
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    excludes: Vec<Pattern>,
}

impl PathFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let excludes = patterns
            .iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { excludes })
    }

    /// Checksums and generated metadata are not indexable.
    pub fn is_indexable(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        !self.excludes.iter().any(|p| p.matches(path))
    }
}

/// An open catalog, holding its write lock until closed or dropped
#[derive(Debug)]
pub struct Catalog {
    key: RepositoryKey,
    content_root: PathBuf,
    index_dir: PathBuf,
    lock: Option<File>,
    timestamp: Option<DateTime<Utc>>,
    next_timestamp: Option<DateTime<Utc>>,
    sections: BTreeMap<RepositoryKey, BTreeMap<String, CatalogEntry>>,
}

impl Catalog {
    /// Open the catalog in `index_dir`, creating it if it does not exist.
    pub fn open(key: &RepositoryKey, content_root: &Path, index_dir: &Path) -> Result<Self> {
        fs::create_dir_all(index_dir).map_err(|e| Error::CatalogOpen {
            key: key.clone(),
            message: format!("cannot create {}: {}", index_dir.display(), e),
        })?;

        let lock = acquire_lock(key, &index_dir.join(LOCK_FILE))?;

        // From here on, dropping `catalog` releases the lock.
        let mut catalog = Self {
            key: key.clone(),
            content_root: content_root.to_path_buf(),
            index_dir: index_dir.to_path_buf(),
            lock: Some(lock),
            timestamp: None,
            next_timestamp: None,
            sections: BTreeMap::new(),
        };

        if let Some(snapshot) = read_snapshot(key, index_dir)? {
            if snapshot.id != key.to_string() {
                warn!("Catalog in {} was written for {}", index_dir.display(), snapshot.id);
            }
            catalog.timestamp = snapshot.timestamp;
            catalog.sections = group_by_source(snapshot.entries);
        }

        Ok(catalog)
    }

    /// Whether a committed catalog exists in `index_dir`.
    pub fn exists_at(index_dir: &Path) -> bool {
        index_dir.join(CATALOG_FILE).is_file()
    }

    /// Summarize the committed catalog in `index_dir` without locking it.
    pub fn summary(key: &RepositoryKey, index_dir: &Path) -> Result<Option<CatalogSummary>> {
        Ok(read_snapshot(key, index_dir)?.map(|snapshot| {
            let mut sources = BTreeMap::new();
            for entry in &snapshot.entries {
                *sources.entry(entry.source.clone()).or_insert(0) += 1;
            }
            CatalogSummary {
                timestamp: snapshot.timestamp,
                entries: snapshot.entries.len(),
                sources,
            }
        }))
    }

    /// Entries `key` itself contributed to the committed catalog in
    /// `index_dir`, read without locking. `None` when nothing was committed.
    pub fn committed_entries(
        key: &RepositoryKey,
        index_dir: &Path,
    ) -> Result<Option<Vec<CatalogEntry>>> {
        Ok(read_snapshot(key, index_dir)?.map(|snapshot| {
            snapshot
                .entries
                .into_iter()
                .filter(|entry| entry.source == *key)
                .collect()
        }))
    }

    pub fn key(&self) -> &RepositoryKey {
        &self.key
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Time of the last commit, `None` for a catalog that was never committed.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.sections.values().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Repositories with at least one staged entry.
    pub fn sources(&self) -> BTreeSet<RepositoryKey> {
        self.sections
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(source, _)| source.clone())
            .collect()
    }

    /// Staged entries for `path`, one per contributing repository.
    pub fn find(&self, path: &str) -> Vec<&CatalogEntry> {
        let path = path.trim_start_matches('/');
        self.sections
            .values()
            .filter_map(|entries| entries.get(path))
            .collect()
    }

    /// Rebuild this repository's entries from its content.
    pub fn scan(&mut self, filter: &PathFilter) -> Result<usize> {
        let entries = collect_entries(&self.key, &self.content_root, filter)?;
        let count = entries.len();
        self.sections.clear();
        self.sections.insert(self.key.clone(), entries);
        Ok(count)
    }

    /// Merge the committed catalog found in another index directory.
    ///
    /// Each source in the other catalog replaces this catalog's section for
    /// that source. Returns the number of merged entries.
    pub fn merge_from(&mut self, other_key: &RepositoryKey, other_index_dir: &Path) -> Result<usize> {
        let snapshot = read_snapshot(other_key, other_index_dir)
            .map_err(|e| Error::Merge {
                source_key: other_key.clone(),
                target: self.key.clone(),
                message: e.to_string(),
            })?
            .ok_or_else(|| Error::Merge {
                source_key: other_key.clone(),
                target: self.key.clone(),
                message: format!("no catalog in {}", other_index_dir.display()),
            })?;

        let count = snapshot.entries.len();
        let mut incoming = group_by_source(snapshot.entries);
        // A catalog that was committed empty still owns its section.
        incoming.entry(other_key.clone()).or_default();
        self.sections.extend(incoming);
        Ok(count)
    }

    /// Drop every section whose source is not in `keep`.
    pub fn retain_sources(&mut self, keep: &HashSet<RepositoryKey>) {
        self.sections.retain(|source, _| keep.contains(source));
    }

    /// Replace this repository's own entries wholesale.
    pub fn replace_entries(&mut self, entries: Vec<CatalogEntry>) {
        let own = self.own_entries(entries);
        self.sections.insert(self.key.clone(), own);
    }

    /// Upsert changed entries and drop removed paths in this repository's
    /// own section.
    pub fn apply_changes(&mut self, changed: Vec<CatalogEntry>, removed: &[String]) {
        let own = self.own_entries(changed);
        let section = self.sections.entry(self.key.clone()).or_default();
        for path in removed {
            section.remove(path.trim_start_matches('/'));
        }
        section.extend(own);
    }

    /// Timestamp to record on the next commit instead of the commit time.
    pub fn set_next_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.next_timestamp = Some(timestamp);
    }

    /// Persist the staged entries atomically.
    pub fn commit(&mut self) -> Result<()> {
        let timestamp = self.next_timestamp.take().unwrap_or_else(Utc::now);
        let snapshot = Snapshot {
            id: self.key.to_string(),
            timestamp: Some(timestamp),
            entries: self
                .sections
                .values()
                .flat_map(|entries| entries.values().cloned())
                .collect(),
        };

        let commit_err = |e: &dyn std::fmt::Display| Error::Commit {
            key: self.key.clone(),
            message: e.to_string(),
        };
        let json = serde_json::to_vec_pretty(&snapshot).map_err(|e| commit_err(&e))?;
        let tmp = self.index_dir.join(format!("{}.tmp", CATALOG_FILE));
        fs::write(&tmp, json).map_err(|e| commit_err(&e))?;
        fs::rename(&tmp, self.index_dir.join(CATALOG_FILE)).map_err(|e| commit_err(&e))?;

        self.timestamp = Some(timestamp);
        Ok(())
    }

    /// Release the write lock.
    pub fn close(mut self) -> Result<()> {
        match self.lock.take() {
            Some(lock) => lock.unlock().map_err(|e| Error::CatalogOpen {
                key: self.key.clone(),
                message: format!(
                    "cannot release {}: {}",
                    self.index_dir.join(LOCK_FILE).display(),
                    e
                ),
            }),
            None => Ok(()),
        }
    }

    fn own_entries(&self, entries: Vec<CatalogEntry>) -> BTreeMap<String, CatalogEntry> {
        entries
            .into_iter()
            .map(|mut entry| {
                entry.path = entry.path.trim_start_matches('/').to_string();
                entry.source = self.key.clone();
                (entry.path.clone(), entry)
            })
            .collect()
    }
}

impl Drop for Catalog {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            if let Err(e) = lock.unlock() {
                warn!(
                    "Failed to release catalog lock {}: {}",
                    self.index_dir.join(LOCK_FILE).display(),
                    e
                );
            }
        }
    }
}

/// Take the exclusive lock on `path`, creating the file if needed.
///
/// A lock file left behind by a holder that died is simply locked again.
fn acquire_lock(key: &RepositoryKey, path: &Path) -> Result<File> {
    let open_err = |e: std::io::Error| Error::CatalogOpen {
        key: key.clone(),
        message: format!("cannot open {}: {}", path.display(), e),
    };

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(open_err)?;

    if let Err(e) = file.try_lock_exclusive() {
        if e.kind() == fs2::lock_contended_error().kind() {
            return Err(Error::CatalogLocked {
                key: key.clone(),
                lock: path.display().to_string(),
            });
        }
        return Err(open_err(e));
    }

    // Lock holder's pid, for whoever finds the catalog busy.
    let written = file
        .set_len(0)
        .and_then(|_| writeln!(file, "{}", std::process::id()));
    if let Err(e) = written {
        warn!("Cannot record lock holder in {}: {}", path.display(), e);
    }

    Ok(file)
}

/// Walk a repository's content root and describe every indexable file.
///
/// Errors on individual entries are logged and skipped; an unreadable
/// content root fails the whole walk. A missing root yields no entries.
pub fn collect_entries(
    key: &RepositoryKey,
    content_root: &Path,
    filter: &PathFilter,
) -> Result<BTreeMap<String, CatalogEntry>> {
    let mut entries = BTreeMap::new();
    if !content_root.exists() {
        return Ok(entries);
    }

    let walker = WalkDir::new(content_root)
        .into_iter()
        .filter_entry(|e| e.depth() != 1 || e.file_name() != INDEX_DIR);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Error::Scan {
                    key: key.clone(),
                    message: e.to_string(),
                });
            }
            Err(e) => {
                warn!("{}. While scanning, encountered error: {}", key, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(content_root) else {
            continue;
        };
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !filter.is_indexable(&path) {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| Error::Scan {
            key: key.clone(),
            message: e.to_string(),
        })?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        entries.insert(
            path.clone(),
            CatalogEntry {
                path,
                source: key.clone(),
                size: metadata.len(),
                modified,
            },
        );
    }

    Ok(entries)
}

fn read_snapshot(key: &RepositoryKey, index_dir: &Path) -> Result<Option<Snapshot>> {
    let file = index_dir.join(CATALOG_FILE);
    let bytes = match fs::read(&file) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::CatalogOpen {
                key: key.clone(),
                message: format!("cannot read {}: {}", file.display(), e),
            });
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| Error::CatalogCorrupt {
            key: key.clone(),
            message: format!("{}: {}", file.display(), e),
        })
}

fn group_by_source(entries: Vec<CatalogEntry>) -> BTreeMap<RepositoryKey, BTreeMap<String, CatalogEntry>> {
    let mut sections: BTreeMap<RepositoryKey, BTreeMap<String, CatalogEntry>> = BTreeMap::new();
    for entry in entries {
        sections
            .entry(entry.source.clone())
            .or_default()
            .insert(entry.path.clone(), entry);
    }
    sections
}
