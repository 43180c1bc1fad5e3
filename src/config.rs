//! # Configuration File
//!
//! This module defines `group-index.yaml`, the file describing where
//! repository content lives, how often catalogs are refreshed and which
//! repositories exist.
//!
//! ```yaml
//! storage_root: /var/lib/group-index
//! group_ttl_secs: 86400
//! hosted_ttl_secs: 600
//! exclude: ["**/*.sha1", "**/*.md5"]
//! repositories:
//!   - type: hosted
//!     name: releases
//!   - type: remote
//!     name: central
//!     url: https://repo.maven.apache.org/maven2
//!   - type: group
//!     name: public
//!     members: ["hosted:releases", "remote:central"]
//! ```
//!
//! Every field is optional. Parsing validates the repository list so that a
//! bad file fails with a `ConfigParse` error carrying a hint, instead of
//! surfacing later as lookup failures.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::PathFilter;
use crate::defaults::{
    default_storage_root, DEFAULT_EXCLUDES, DEFAULT_MAX_GROUP_DEPTH, GROUP_INDEX_TIMEOUT,
    HOSTED_INDEX_TIMEOUT, INDEX_KEY_PREFIX,
};
use crate::error::{Error, Result};
use crate::registry::MemoryRegistry;
use crate::store::{RepositoryDescriptor, RepositoryKey, RepositoryType};

/// One repository declared in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    #[serde(rename = "type")]
    pub repo_type: RepositoryType,
    pub name: String,
    /// Upstream location of a remote repository, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Ordered members of a group, as `type:name`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

impl RepositoryConfig {
    pub fn key(&self) -> RepositoryKey {
        RepositoryKey::new(self.repo_type, &self.name)
    }
}

/// Contents of `group-index.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding every repository's content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_root: Option<PathBuf>,
    /// Staleness timeout for group aggregates
    #[serde(default = "default_group_ttl_secs")]
    pub group_ttl_secs: u64,
    /// Debounce delay between a hosted write and its rescan
    #[serde(default = "default_hosted_ttl_secs")]
    pub hosted_ttl_secs: u64,
    /// Namespace of the refresh timers
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_max_group_depth")]
    pub max_group_depth: usize,
    /// Glob patterns of paths that are never indexed
    #[serde(default = "default_excludes")]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

fn default_group_ttl_secs() -> u64 {
    GROUP_INDEX_TIMEOUT.as_secs()
}

fn default_hosted_ttl_secs() -> u64 {
    HOSTED_INDEX_TIMEOUT.as_secs()
}

fn default_key_prefix() -> String {
    INDEX_KEY_PREFIX.to_string()
}

fn default_max_group_depth() -> usize {
    DEFAULT_MAX_GROUP_DEPTH
}

fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_root: None,
            group_ttl_secs: default_group_ttl_secs(),
            hosted_ttl_secs: default_hosted_ttl_secs(),
            key_prefix: default_key_prefix(),
            max_group_depth: default_max_group_depth(),
            exclude: default_excludes(),
            repositories: Vec::new(),
        }
    }
}

impl Config {
    /// Parse and validate a YAML document. An empty document yields the
    /// defaults.
    pub fn parse(yaml_content: &str) -> Result<Self> {
        if yaml_content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            hint: Some(
                "expected keys: storage_root, group_ttl_secs, hosted_ttl_secs, key_prefix, \
                 max_group_depth, exclude, repositories"
                    .to_string(),
            ),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file. A relative `storage_root` is resolved
    /// against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
            message: format!("cannot read {}: {}", path.display(), e),
            hint: Some("pass --config or set GROUP_INDEX_CONFIG".to_string()),
        })?;
        let mut config = Self::parse(&content)?;

        if let Some(root) = config.storage_root.as_ref().filter(|r| r.is_relative()) {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.storage_root = Some(base.join(root));
        }
        Ok(config)
    }

    pub fn group_ttl(&self) -> Duration {
        Duration::from_secs(self.group_ttl_secs)
    }

    pub fn hosted_ttl(&self) -> Duration {
        Duration::from_secs(self.hosted_ttl_secs)
    }

    /// Configured storage root, or the per-user default.
    pub fn storage_root(&self) -> PathBuf {
        self.storage_root.clone().unwrap_or_else(default_storage_root)
    }

    pub fn path_filter(&self) -> Result<PathFilter> {
        PathFilter::new(&self.exclude)
    }

    /// Repository descriptors with member references resolved.
    pub fn descriptors(&self) -> Result<Vec<RepositoryDescriptor>> {
        self.repositories
            .iter()
            .map(|repo| {
                Ok(match repo.repo_type {
                    RepositoryType::Hosted => RepositoryDescriptor::Hosted {
                        name: repo.name.clone(),
                    },
                    RepositoryType::Remote => RepositoryDescriptor::Remote {
                        name: repo.name.clone(),
                        url: repo.url.clone(),
                    },
                    RepositoryType::Group => RepositoryDescriptor::Group {
                        name: repo.name.clone(),
                        members: repo
                            .members
                            .iter()
                            .map(|m| parse_member(&repo.name, m))
                            .collect::<Result<_>>()?,
                    },
                })
            })
            .collect()
    }

    /// Registry holding every configured repository.
    pub fn build_registry(&self) -> Result<MemoryRegistry> {
        let registry = MemoryRegistry::with_max_depth(self.max_group_depth);
        for descriptor in self.descriptors()? {
            registry.insert(descriptor)?;
        }
        Ok(registry)
    }

    fn validate(&self) -> Result<()> {
        if self.group_ttl_secs == 0 || self.hosted_ttl_secs == 0 {
            return Err(Error::ConfigParse {
                message: "refresh timeouts must be positive".to_string(),
                hint: Some("group_ttl_secs and hosted_ttl_secs are in seconds".to_string()),
            });
        }
        if self.key_prefix.is_empty() || self.key_prefix.contains(':') {
            return Err(Error::ConfigParse {
                message: format!("invalid key_prefix '{}'", self.key_prefix),
                hint: Some("use a non-empty prefix without ':'".to_string()),
            });
        }
        if let Err(e) = self.path_filter() {
            return Err(Error::ConfigParse {
                message: format!("invalid exclude pattern: {}", e),
                hint: Some("exclude entries are glob patterns such as '**/*.sha1'".to_string()),
            });
        }

        let mut declared = HashSet::new();
        for repo in &self.repositories {
            if repo.name.is_empty() || repo.name.contains([':', '/', '\\']) {
                return Err(Error::ConfigParse {
                    message: format!("invalid repository name '{}'", repo.name),
                    hint: Some("names must be non-empty and contain no ':' or path separators".to_string()),
                });
            }
            if !declared.insert(repo.key()) {
                return Err(Error::ConfigParse {
                    message: format!("repository '{}' is declared twice", repo.key()),
                    hint: None,
                });
            }
            if repo.repo_type != RepositoryType::Group && !repo.members.is_empty() {
                return Err(Error::ConfigParse {
                    message: format!("repository '{}' lists members", repo.key()),
                    hint: Some("only repositories with type 'group' have members".to_string()),
                });
            }
        }

        for repo in &self.repositories {
            for member in &repo.members {
                let key = parse_member(&repo.name, member)?;
                if !declared.contains(&key) {
                    return Err(Error::ConfigParse {
                        message: format!("group '{}' references unknown member '{}'", repo.name, key),
                        hint: Some(format!(
                            "declare '{}' under repositories or remove it from the group",
                            key
                        )),
                    });
                }
            }
        }
        Ok(())
    }
}

fn parse_member(group: &str, member: &str) -> Result<RepositoryKey> {
    member.parse().map_err(|_| Error::ConfigParse {
        message: format!("group '{}' has malformed member '{}'", group, member),
        hint: Some("members are written as type:name, e.g. 'hosted:releases'".to_string()),
    })
}
