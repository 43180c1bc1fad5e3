//! # Repository Registry
//!
//! The registry is the source of truth for which repositories exist and how
//! groups are composed. The indexing core only reads from it; adding and
//! removing repositories is the registry owner's business.
//!
//! ## Design
//!
//! `StoreRegistry` is a trait so that the core can run against whatever
//! persists repository definitions. `MemoryRegistry` is the bundled
//! implementation, used by the binary (populated from configuration) and by
//! tests.
//!
//! Group membership may nest and may even be cyclic (`a` contains `b`, `b`
//! contains `a`). Flattening is depth-first in member order, skips anything
//! already seen and stops descending past a configured depth.

use log::warn;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::RwLock;

use crate::defaults::DEFAULT_MAX_GROUP_DEPTH;
use crate::error::{Error, Result};
use crate::store::{RepositoryDescriptor, RepositoryKey, RepositoryType};

/// Read access to repository definitions
pub trait StoreRegistry: Send + Sync {
    /// Look up a single repository.
    fn get(&self, key: &RepositoryKey) -> Result<RepositoryDescriptor>;

    /// Concrete members of a group in resolution order, with nested groups
    /// flattened in place. Each concrete repository appears at most once.
    fn ordered_members(&self, group_name: &str) -> Result<Vec<RepositoryKey>>;

    /// Every group that contains `key`, directly or through nested groups.
    fn groups_containing(&self, key: &RepositoryKey) -> Result<Vec<RepositoryKey>>;

    /// All known repositories of one type, sorted by name.
    fn all_of_type(&self, repo_type: RepositoryType) -> Result<Vec<RepositoryKey>>;
}

/// In-memory registry
#[derive(Debug)]
pub struct MemoryRegistry {
    stores: RwLock<BTreeMap<RepositoryKey, RepositoryDescriptor>>,
    max_depth: usize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_GROUP_DEPTH)
    }

    /// Create a registry that stops flattening nested groups below `max_depth`
    /// levels of nesting.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            stores: RwLock::new(BTreeMap::new()),
            max_depth,
        }
    }

    /// Add or replace a repository definition.
    pub fn insert(&self, descriptor: RepositoryDescriptor) -> Result<()> {
        let mut stores = self.stores.write().map_err(|_| Error::LockPoisoned {
            context: "registry".to_string(),
        })?;
        stores.insert(descriptor.key(), descriptor);
        Ok(())
    }

    /// Remove a repository definition, returning it if it existed.
    ///
    /// Group member lists that reference the key are left alone; dangling
    /// members are skipped during flattening.
    pub fn remove(&self, key: &RepositoryKey) -> Result<Option<RepositoryDescriptor>> {
        let mut stores = self.stores.write().map_err(|_| Error::LockPoisoned {
            context: "registry".to_string(),
        })?;
        Ok(stores.remove(key))
    }

    pub fn len(&self) -> usize {
        self.stores.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn flatten(
        &self,
        stores: &BTreeMap<RepositoryKey, RepositoryDescriptor>,
        members: &[RepositoryKey],
        depth: usize,
        visited: &mut HashSet<RepositoryKey>,
        out: &mut Vec<RepositoryKey>,
    ) {
        for member in members {
            if !visited.insert(member.clone()) {
                continue;
            }

            match stores.get(member) {
                Some(RepositoryDescriptor::Group { members, .. }) => {
                    if depth >= self.max_depth {
                        warn!(
                            "Group nesting deeper than {} levels at {}; ignoring its members",
                            self.max_depth, member
                        );
                        continue;
                    }
                    self.flatten(stores, members, depth + 1, visited, out);
                }
                Some(_) => out.push(member.clone()),
                None => warn!("Group member {} is not a known repository; skipping", member),
            }
        }
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreRegistry for MemoryRegistry {
    fn get(&self, key: &RepositoryKey) -> Result<RepositoryDescriptor> {
        let stores = self.stores.read().map_err(|_| Error::LockPoisoned {
            context: "registry".to_string(),
        })?;
        stores.get(key).cloned().ok_or_else(|| Error::Lookup {
            key: key.to_string(),
            message: "no such repository".to_string(),
        })
    }

    fn ordered_members(&self, group_name: &str) -> Result<Vec<RepositoryKey>> {
        let stores = self.stores.read().map_err(|_| Error::LockPoisoned {
            context: "registry".to_string(),
        })?;
        let group_key = RepositoryKey::group(group_name);
        let group = stores.get(&group_key).ok_or_else(|| Error::Lookup {
            key: group_key.to_string(),
            message: "no such group".to_string(),
        })?;

        let mut visited = HashSet::new();
        visited.insert(group_key);
        let mut out = Vec::new();
        self.flatten(&stores, group.members(), 1, &mut visited, &mut out);
        Ok(out)
    }

    fn groups_containing(&self, key: &RepositoryKey) -> Result<Vec<RepositoryKey>> {
        let stores = self.stores.read().map_err(|_| Error::LockPoisoned {
            context: "registry".to_string(),
        })?;

        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([key.clone()]);
        while let Some(current) = queue.pop_front() {
            for descriptor in stores.values() {
                let group_key = descriptor.key();
                if descriptor.members().contains(&current)
                    && group_key != *key
                    && found.insert(group_key.clone())
                {
                    queue.push_back(group_key);
                }
            }
        }

        Ok(found.into_iter().collect())
    }

    fn all_of_type(&self, repo_type: RepositoryType) -> Result<Vec<RepositoryKey>> {
        let stores = self.stores.read().map_err(|_| Error::LockPoisoned {
            context: "registry".to_string(),
        })?;
        Ok(stores
            .keys()
            .filter(|k| k.repo_type == repo_type)
            .cloned()
            .collect())
    }
}
