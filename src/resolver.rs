//! # Group Content Resolution
//!
//! The read path. A request against a concrete repository is a single
//! lookup. A request against a group walks the group's flattened member list
//! in priority order and returns the first member holding the path, so
//! earlier members shadow later ones.
//!
//! Folder listings are different: a listing must be complete, so a group
//! listing is the union of the children of every member that has the folder,
//! deduplicated and sorted.
//!
//! Nothing here touches catalogs or the indexing worker. Failures (unknown
//! repository, invalid path) are logged and reported as "not found".

use log::{debug, error, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::content::{ContentStore, Transfer};
use crate::registry::StoreRegistry;
use crate::store::RepositoryKey;

/// Resolves paths across repositories and groups
#[derive(Clone)]
pub struct ContentResolver {
    registry: Arc<dyn StoreRegistry>,
    content: Arc<dyn ContentStore>,
}

impl ContentResolver {
    pub fn new(registry: Arc<dyn StoreRegistry>, content: Arc<dyn ContentStore>) -> Self {
        Self { registry, content }
    }

    /// Find the transfer for `path`, or `None` when no candidate has it.
    pub fn resolve(&self, key: &RepositoryKey, path: &str) -> Option<Transfer> {
        let candidates = self.candidates(key)?;

        for candidate in &candidates {
            if !self.content.exists(candidate, path) {
                continue;
            }
            match self.content.transfer(candidate, path) {
                Ok(transfer) => {
                    debug!("Resolved {} in {} from {}", path, key, candidate);
                    return Some(transfer);
                }
                Err(e) => {
                    warn!("Cannot build transfer for {} in {}: {}", path, candidate, e);
                    return None;
                }
            }
        }

        None
    }

    /// List the children of `folder`. For groups this is the sorted union
    /// over all members that have the folder.
    pub fn list_children(&self, key: &RepositoryKey, folder: &str) -> Vec<String> {
        let Some(candidates) = self.candidates(key) else {
            return Vec::new();
        };

        let mut names = BTreeSet::new();
        for candidate in &candidates {
            if !self.content.exists(candidate, folder) {
                continue;
            }
            if !self.content.is_directory(candidate, folder) {
                error!("Transfer: {} in {} is not a directory.", folder, candidate);
                continue;
            }
            match self.content.list(candidate, folder) {
                Ok(children) => names.extend(children),
                Err(e) => error!("Failed to list {} in {}: {}", folder, candidate, e),
            }
        }

        names.into_iter().collect()
    }

    /// Concrete repositories to consult for `key`, in priority order.
    fn candidates(&self, key: &RepositoryKey) -> Option<Vec<RepositoryKey>> {
        if key.is_group() {
            match self.registry.ordered_members(&key.name) {
                Ok(members) => Some(members),
                Err(e) => {
                    error!("Failed to lookup repositories in group: {}. Reason: {}", key, e);
                    None
                }
            }
        } else {
            match self.registry.get(key) {
                Ok(_) => Some(vec![key.clone()]),
                Err(e) => {
                    error!("Failed to lookup repository: {}. Reason: {}", key, e);
                    None
                }
            }
        }
    }
}
