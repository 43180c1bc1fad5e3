//! # Error Handling
//!
//! This module defines the centralized error type for `group-index`. It uses
//! the `thiserror` library to build a single `Error` enum covering every
//! failure the indexing core can run into.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. The catalog and aggregation variants follow
//!   the failure classes the coordinator distinguishes:
//!   - lookup failures (repository metadata not found),
//!   - catalog open failures (lock contention, corruption, I/O),
//!   - scan, merge and commit failures,
//!   - remote sync failures,
//!   - scheduling failures.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! None of these errors is fatal to the process. The coordinator logs them
//! and narrows their effect to one member or one merge pass; read-path
//! callers never see them, only a possibly stale aggregate.

use thiserror::Error;

use crate::store::RepositoryKey;

/// Main error type for group-index operations
#[derive(Error, Debug)]
pub enum Error {
    /// Repository or group metadata could not be found.
    #[error("Repository lookup failed for {key}: {message}")]
    Lookup { key: String, message: String },

    /// A catalog could not be opened or created.
    #[error("Failed to open catalog for {key}: {message}")]
    CatalogOpen { key: RepositoryKey, message: String },

    /// Another operation currently holds the catalog's write lock.
    #[error("Catalog for {key} is locked by another operation: {lock}")]
    CatalogLocked { key: RepositoryKey, lock: String },

    /// The committed catalog on disk cannot be read back.
    #[error("Catalog for {key} is corrupt: {message}")]
    CatalogCorrupt { key: RepositoryKey, message: String },

    /// Rebuilding a catalog from repository content failed.
    #[error("Failed to scan {key}: {message}")]
    Scan { key: RepositoryKey, message: String },

    /// Merging one catalog into another failed.
    #[error("Failed to merge catalog from {source_key} into {target}: {message}")]
    Merge {
        source_key: RepositoryKey,
        target: RepositoryKey,
        message: String,
    },

    /// Writing the pending catalog state failed.
    #[error("Failed to commit catalog for {key}: {message}")]
    Commit { key: RepositoryKey, message: String },

    /// Fetching or applying a remote catalog update failed.
    #[error("Remote catalog sync failed for {key}: {message}")]
    RemoteSync { key: RepositoryKey, message: String },

    /// A refresh timer could not be armed or cancelled.
    #[error("Scheduling error for {key}: {message}")]
    Scheduling { key: String, message: String },

    /// An error occurred while parsing the configuration file.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A path could not be interpreted relative to a repository root.
    #[error("Path operation error: {message}")]
    Path { message: String },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// The worker or scheduler thread is no longer accepting work.
    #[error("Channel closed: {context}")]
    ChannelClosed { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
