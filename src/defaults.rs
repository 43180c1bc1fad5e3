//! Default values for group-index configuration.
//!
//! This module provides centralized default values used across the library
//! and the commands, ensuring consistency and avoiding duplication.

use std::path::PathBuf;
use std::time::Duration;

/// How long a group's aggregate catalog may go without a refresh.
pub const GROUP_INDEX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Debounce window between the first write to a hosted repository and its rescan.
pub const HOSTED_INDEX_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Namespace for this subsystem's expiration keys.
pub const INDEX_KEY_PREFIX: &str = "group-index";

/// Nesting bound applied when flattening groups.
pub const DEFAULT_MAX_GROUP_DEPTH: usize = 16;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "group-index.yaml";

/// Paths that are never indexed: checksums and generated metadata.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/*.sha1",
    "**/*.md5",
    "**/maven-metadata.xml",
    "**/archetype-catalog.xml",
];

/// Returns the default storage root directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/group-index` (XDG Base Directory)
/// - macOS: `~/Library/Caches/group-index`
/// - Windows: `{FOLDERID_LocalAppData}\group-index`
///
/// Falls back to `.group-index-storage` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the `storage_root` configuration key or the
/// `GROUP_INDEX_STORAGE` environment variable.
pub fn default_storage_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".group-index-storage"))
        .join("group-index")
}
