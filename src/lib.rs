//! # Group Index Library
//!
//! This library implements content resolution and catalog aggregation for
//! repository groups in an artifact-repository proxy. A *group* is an
//! ordered list of repositories that behaves like a single repository: a
//! read asks each member in turn, and the group's searchable catalog is the
//! merge of its members' catalogs. It backs the `group-index` command-line
//! tool but is meant to be embedded in a repository manager.
//!
//! ## Quick Example
//!
//! ```
//! use std::sync::Arc;
//! use group_index::content::{ContentStore, FileContentStore};
//! use group_index::registry::MemoryRegistry;
//! use group_index::resolver::ContentResolver;
//! use group_index::store::{RepositoryDescriptor, RepositoryKey};
//!
//! let temp = tempfile::TempDir::new().unwrap();
//! let content = Arc::new(FileContentStore::new(temp.path().to_path_buf()));
//! let registry = Arc::new(MemoryRegistry::new());
//! registry
//!     .insert(RepositoryDescriptor::Hosted { name: "releases".into() })
//!     .unwrap();
//! registry
//!     .insert(RepositoryDescriptor::Group {
//!         name: "public".into(),
//!         members: vec![RepositoryKey::hosted("releases")],
//!     })
//!     .unwrap();
//!
//! let jar = content
//!     .storage_root(&RepositoryKey::hosted("releases"))
//!     .join("org/x/1.0/x-1.0.jar");
//! std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
//! std::fs::write(&jar, b"jar").unwrap();
//!
//! let resolver = ContentResolver::new(registry, content);
//! let transfer = resolver
//!     .resolve(&RepositoryKey::group("public"), "/org/x/1.0/x-1.0.jar")
//!     .unwrap();
//! assert_eq!(transfer.key, RepositoryKey::hosted("releases"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Repositories (`store`, `registry`)**: hosted, remote and group
//!   repositories, and the registry that flattens groups into their
//!   ordered concrete members.
//! - **Content (`content`, `resolver`)**: where artifact bytes live, and
//!   first-match resolution plus merged listings across a group.
//! - **Catalogs (`catalog`, `catalog_manager`, `remote`)**: per-repository
//!   searchable indexes, their locks and commits, and incremental updates
//!   for remote repositories.
//! - **Refresh (`scheduler`, `coordinator`, `worker`, `service`)**: timers
//!   for stale groups and debounced hosted writes, the merge pass, and the
//!   single worker thread that runs all catalog work.
//!
//! ## Execution Flow
//!
//! 1.  A hook (`IndexService::on_content_written`, `on_repositories_added`,
//!     `on_repositories_deleted`) or a timer enqueues a work item.
//! 2.  The worker takes items in order and hands them to the coordinator.
//! 3.  The coordinator rebuilds or syncs member catalogs as needed, merges
//!     them into every affected group's aggregate and commits it.
//! 4.  Each merged group gets its next refresh armed.
//!
//! Reads never wait on any of this: resolution and listing go straight to
//! member content.

pub mod catalog;
pub mod catalog_manager;
pub mod config;
pub mod content;
pub mod coordinator;
pub mod defaults;
pub mod error;
pub mod output;
pub mod registry;
pub mod remote;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod worker;
