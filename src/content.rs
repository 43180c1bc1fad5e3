//! # Repository Content Access
//!
//! Raw artifact bytes live under a per-repository storage root. This module
//! exposes the small slice of that storage the indexing core needs: does a
//! path exist, what does a folder contain, and where is a repository's root
//! directory.
//!
//! The on-disk implementation, `FileContentStore`, lays repositories out as
//! `<storage_root>/<type>-<name>/`. Each root may contain a `.index/`
//! directory holding the repository's catalog; that directory is not content,
//! so nothing below it exists or lists as far as this store is concerned.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::RepositoryKey;

/// Name of the per-repository directory that holds the catalog.
pub const INDEX_DIR: &str = ".index";

/// A located piece of content: which repository, which path, which file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub key: RepositoryKey,
    /// Repository-relative path, `/`-separated, without a leading slash
    pub path: String,
    /// Absolute location in storage
    pub file: PathBuf,
}

/// Trait for content lookups - allows mocking in tests
pub trait ContentStore: Send + Sync {
    /// Directory holding the repository's content.
    fn storage_root(&self, key: &RepositoryKey) -> PathBuf;

    /// Whether anything (file or folder) exists at `path`.
    fn exists(&self, key: &RepositoryKey, path: &str) -> bool;

    /// Whether `path` is a folder.
    fn is_directory(&self, key: &RepositoryKey, path: &str) -> bool;

    /// Child names of the folder at `path`.
    fn list(&self, key: &RepositoryKey, path: &str) -> Result<Vec<String>>;

    /// Build the transfer describing `path` in `key`, whether or not it exists.
    fn transfer(&self, key: &RepositoryKey, path: &str) -> Result<Transfer> {
        let relative = normalize_path(path)?;
        let file = self.storage_root(key).join(&relative);
        Ok(Transfer {
            key: key.clone(),
            path: relative,
            file,
        })
    }
}

/// Normalize a request path into a repository-relative path.
///
/// Leading and repeated slashes are dropped; `.` segments are ignored and
/// `..` segments are rejected so lookups cannot escape a repository root.
pub fn normalize_path(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| Error::Path {
                    message: format!("non UTF-8 path segment in {}", path),
                })?;
                parts.push(part);
            }
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(Error::Path {
                    message: format!("path escapes repository root: {}", path),
                });
            }
        }
    }
    Ok(parts.join("/"))
}

/// Whether a normalized path points into the catalog directory.
fn is_index_path(relative: &str) -> bool {
    relative.split('/').next() == Some(INDEX_DIR)
}

/// Content stored on the local filesystem
#[derive(Debug, Clone)]
pub struct FileContentStore {
    root: PathBuf,
}

impl FileContentStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &RepositoryKey, path: &str) -> Option<PathBuf> {
        normalize_path(path)
            .ok()
            .filter(|relative| !is_index_path(relative))
            .map(|relative| self.storage_root(key).join(relative))
    }
}

impl ContentStore for FileContentStore {
    fn storage_root(&self, key: &RepositoryKey) -> PathBuf {
        self.root.join(format!("{}-{}", key.repo_type, key.name))
    }

    fn exists(&self, key: &RepositoryKey, path: &str) -> bool {
        self.resolve(key, path).is_some_and(|file| file.exists())
    }

    fn is_directory(&self, key: &RepositoryKey, path: &str) -> bool {
        self.resolve(key, path).is_some_and(|file| file.is_dir())
    }

    fn list(&self, key: &RepositoryKey, path: &str) -> Result<Vec<String>> {
        let relative = normalize_path(path)?;
        if is_index_path(&relative) {
            return Err(Error::Path {
                message: format!("{} is catalog storage, not content", path),
            });
        }
        let dir = self.storage_root(key).join(&relative);

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if relative.is_empty() && name == INDEX_DIR {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/org/x/1.0/x-1.0.jar").unwrap(), "org/x/1.0/x-1.0.jar");
        assert_eq!(normalize_path("org//x/./y").unwrap(), "org/x/y");
        assert_eq!(normalize_path("/").unwrap(), "");
        assert!(normalize_path("/org/../../etc/passwd").is_err());
    }

    #[test]
    fn test_storage_root_layout() {
        let store = FileContentStore::new(PathBuf::from("/var/lib/index"));
        assert_eq!(
            store.storage_root(&RepositoryKey::remote("central")),
            PathBuf::from("/var/lib/index/remote-central")
        );
    }

    #[test]
    fn test_exists_and_transfer() {
        let temp = TempDir::new().unwrap();
        let store = FileContentStore::new(temp.path().to_path_buf());
        let key = RepositoryKey::hosted("local");
        write(&store.storage_root(&key), "a/b.txt", "hello");

        assert!(store.exists(&key, "/a/b.txt"));
        assert!(store.is_directory(&key, "/a"));
        assert!(!store.exists(&key, "/a/c.txt"));
        assert!(!store.exists(&key, "/../outside"));

        let transfer = store.transfer(&key, "/a/b.txt").unwrap();
        assert_eq!(transfer.path, "a/b.txt");
        assert_eq!(fs::read_to_string(transfer.file).unwrap(), "hello");
    }

    #[test]
    fn test_list_hides_index_dir_at_root() {
        let temp = TempDir::new().unwrap();
        let store = FileContentStore::new(temp.path().to_path_buf());
        let key = RepositoryKey::hosted("local");
        let root = store.storage_root(&key);
        write(&root, "org/x.jar", "x");
        write(&root, "com/y.jar", "y");
        write(&root, ".index/catalog.json", "{}");

        assert_eq!(store.list(&key, "/").unwrap(), vec!["com", "org"]);
        assert_eq!(store.list(&key, "org").unwrap(), vec!["x.jar"]);
        assert!(store.list(&key, "missing").is_err());
    }

    #[test]
    fn test_index_dir_is_not_content() {
        let temp = TempDir::new().unwrap();
        let store = FileContentStore::new(temp.path().to_path_buf());
        let key = RepositoryKey::hosted("local");
        let root = store.storage_root(&key);
        write(&root, ".index/catalog.json", "{}");
        write(&root, ".index/sync.properties", "timestamp=");
        write(&root, "org/.index/kept.jar", "x");

        assert!(!store.exists(&key, "/.index/catalog.json"));
        assert!(!store.exists(&key, ".index"));
        assert!(!store.is_directory(&key, "/.index/"));
        assert!(store.list(&key, "/.index").is_err());
        assert!(store.exists(&key, "/org/.index/kept.jar"));
    }
}
