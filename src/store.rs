//! Repository identity and descriptors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The three kinds of repository a key can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    /// Writable, locally stored content
    Hosted,
    /// Local cache mirroring an external source
    Remote,
    /// Ordered aggregation of other repositories
    Group,
}

impl RepositoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryType::Hosted => "hosted",
            RepositoryType::Remote => "remote",
            RepositoryType::Group => "group",
        }
    }

    /// Hosted and remote repositories carry their own content.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, RepositoryType::Group)
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepositoryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hosted" => Ok(RepositoryType::Hosted),
            "remote" => Ok(RepositoryType::Remote),
            "group" => Ok(RepositoryType::Group),
            other => Err(Error::Lookup {
                key: other.to_string(),
                message: "unknown repository type (expected hosted, remote or group)".to_string(),
            }),
        }
    }
}

/// Globally unique repository identity, rendered as `type:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepositoryKey {
    pub repo_type: RepositoryType,
    pub name: String,
}

impl RepositoryKey {
    pub fn new(repo_type: RepositoryType, name: &str) -> Self {
        Self {
            repo_type,
            name: name.to_string(),
        }
    }

    pub fn hosted(name: &str) -> Self {
        Self::new(RepositoryType::Hosted, name)
    }

    pub fn remote(name: &str) -> Self {
        Self::new(RepositoryType::Remote, name)
    }

    pub fn group(name: &str) -> Self {
        Self::new(RepositoryType::Group, name)
    }

    pub fn is_group(&self) -> bool {
        self.repo_type == RepositoryType::Group
    }
}

impl fmt::Display for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repo_type, self.name)
    }
}

impl FromStr for RepositoryKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (repo_type, name) = s.split_once(':').ok_or_else(|| Error::Lookup {
            key: s.to_string(),
            message: "expected a key of the form type:name".to_string(),
        })?;
        if name.is_empty() {
            return Err(Error::Lookup {
                key: s.to_string(),
                message: "repository name is empty".to_string(),
            });
        }
        Ok(Self::new(repo_type.parse()?, name))
    }
}

/// A repository as known to the registry.
///
/// Groups own an ordered member list; the order is resolution priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryDescriptor {
    Hosted { name: String },
    Remote { name: String, url: Option<String> },
    Group { name: String, members: Vec<RepositoryKey> },
}

impl RepositoryDescriptor {
    pub fn key(&self) -> RepositoryKey {
        match self {
            RepositoryDescriptor::Hosted { name } => RepositoryKey::hosted(name),
            RepositoryDescriptor::Remote { name, .. } => RepositoryKey::remote(name),
            RepositoryDescriptor::Group { name, .. } => RepositoryKey::group(name),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RepositoryDescriptor::Hosted { name }
            | RepositoryDescriptor::Remote { name, .. }
            | RepositoryDescriptor::Group { name, .. } => name,
        }
    }

    /// Direct members of a group, empty for concrete repositories
    pub fn members(&self) -> &[RepositoryKey] {
        match self {
            RepositoryDescriptor::Group { members, .. } => members,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_display_and_parse() {
        let key = RepositoryKey::remote("central");
        assert_eq!(key.to_string(), "remote:central");
        let parsed: RepositoryKey = "remote:central".parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_key_parse_keeps_colons_in_name() {
        let parsed: RepositoryKey = "hosted:build:snapshots".parse().unwrap();
        assert_eq!(parsed.repo_type, RepositoryType::Hosted);
        assert_eq!(parsed.name, "build:snapshots");
    }

    #[test]
    fn test_key_parse_rejects_bad_input() {
        assert!("central".parse::<RepositoryKey>().is_err());
        assert!("mirror:central".parse::<RepositoryKey>().is_err());
        assert!("group:".parse::<RepositoryKey>().is_err());
    }

    #[test]
    fn test_keys_hash_by_type_and_name() {
        let mut keys = HashSet::new();
        keys.insert(RepositoryKey::hosted("a"));
        keys.insert(RepositoryKey::remote("a"));
        keys.insert(RepositoryKey::hosted("a"));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_descriptor_members() {
        let group = RepositoryDescriptor::Group {
            name: "public".to_string(),
            members: vec![RepositoryKey::hosted("local"), RepositoryKey::remote("central")],
        };
        assert_eq!(group.key(), RepositoryKey::group("public"));
        assert_eq!(group.members().len(), 2);

        let hosted = RepositoryDescriptor::Hosted {
            name: "local".to_string(),
        };
        assert!(hosted.members().is_empty());
        assert!(hosted.key().repo_type.is_concrete());
    }
}
