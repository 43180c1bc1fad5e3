//! # Index Service
//!
//! `IndexService` wires the engine together and is what a repository
//! manager embeds:
//!
//! - **Hooks** (`on_content_written`, `on_repositories_added`,
//!   `on_repositories_deleted`) enqueue work and return immediately.
//! - **Reads** (`resolve`, `list_children`) run on the caller's thread and
//!   never touch catalogs.
//! - **Lifecycle** (`flush`, `shutdown`) lets callers wait for queued work
//!   and stop the worker and timer threads.
//!
//! Timer expirations are fed back into the same queue as hook events, so
//! every catalog change happens on the worker thread.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::catalog::PathFilter;
use crate::catalog_manager::CatalogManager;
use crate::config::Config;
use crate::content::{ContentStore, Transfer};
use crate::coordinator::AggregationCoordinator;
use crate::error::{Error, Result};
use crate::registry::StoreRegistry;
use crate::remote::RemoteSyncSource;
use crate::resolver::ContentResolver;
use crate::scheduler::RefreshScheduler;
use crate::store::{RepositoryKey, RepositoryType};
use crate::worker::{self, Subscribers, WorkItem, WorkOutcome};

/// Running group-index engine
pub struct IndexService {
    queue: Sender<WorkItem>,
    scheduler: Arc<RefreshScheduler>,
    resolver: ContentResolver,
    catalogs: CatalogManager,
    filter: PathFilter,
    subscribers: Subscribers,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IndexService {
    /// Start the worker and timer threads.
    pub fn start(
        config: &Config,
        registry: Arc<dyn StoreRegistry>,
        content: Arc<dyn ContentStore>,
        remote: Arc<dyn RemoteSyncSource>,
    ) -> Result<Self> {
        let filter = config.path_filter()?;
        let (queue, receiver) = unbounded();

        let expired = queue.clone();
        let scheduler = Arc::new(RefreshScheduler::start(
            &config.key_prefix,
            config.group_ttl(),
            config.hosted_ttl(),
            move |expiration| {
                if expired.send(WorkItem::Expired(expiration.payload)).is_err() {
                    debug!("Dropping expiration of {}: worker stopped", expiration.key);
                }
            },
        )?);

        let coordinator = AggregationCoordinator::new(
            Arc::clone(&registry),
            CatalogManager::new(Arc::clone(&content), filter.clone()),
            remote,
            Arc::clone(&scheduler),
        );
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));
        let handle = worker::spawn(coordinator, receiver, Arc::clone(&subscribers))?;

        info!(
            "Group index started (group refresh every {:?}, hosted debounce {:?})",
            config.group_ttl(),
            config.hosted_ttl()
        );

        Ok(Self {
            queue,
            scheduler,
            resolver: ContentResolver::new(registry, Arc::clone(&content)),
            catalogs: CatalogManager::new(content, filter.clone()),
            filter,
            subscribers,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// A file was stored. Only indexable paths in hosted repositories
    /// schedule a refresh.
    pub fn on_content_written(&self, key: &RepositoryKey, path: &str) -> Result<()> {
        if key.repo_type != RepositoryType::Hosted || !self.filter.is_indexable(path) {
            return Ok(());
        }
        self.enqueue(WorkItem::ContentWritten {
            key: key.clone(),
            path: path.to_string(),
        })
    }

    pub fn on_repositories_added(&self, keys: Vec<RepositoryKey>) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.enqueue(WorkItem::RepositoriesAdded(keys))
    }

    pub fn on_repositories_deleted(&self, repo_type: RepositoryType, names: Vec<String>) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        self.enqueue(WorkItem::RepositoriesDeleted { repo_type, names })
    }

    /// First member of `key` holding `path`.
    pub fn resolve(&self, key: &RepositoryKey, path: &str) -> Option<Transfer> {
        self.resolver.resolve(key, path)
    }

    /// Union of the children of `folder` across `key`'s members.
    pub fn list_children(&self, key: &RepositoryKey, folder: &str) -> Vec<String> {
        self.resolver.list_children(key, folder)
    }

    pub fn catalogs(&self) -> &CatalogManager {
        &self.catalogs
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Receive an outcome for every pass the worker completes from now on.
    pub fn subscribe(&self) -> Result<Receiver<WorkOutcome>> {
        let (sender, receiver) = unbounded();
        self.subscribers
            .lock()
            .map_err(|_| Error::LockPoisoned {
                context: "work outcome subscribers".to_string(),
            })?
            .push(sender);
        Ok(receiver)
    }

    /// Block until everything queued so far has been processed.
    pub fn flush(&self) -> Result<()> {
        let (done, wait) = bounded(1);
        self.enqueue(WorkItem::Flush(done))?;
        wait.recv().map_err(|_| Error::ChannelClosed {
            context: "index worker stopped before flush completed".to_string(),
        })
    }

    /// Stop timers, finish queued work and stop the worker. Idempotent.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();

        let handle = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let _ = self.queue.send(WorkItem::Shutdown);
            if handle.join().is_err() {
                error!("Index worker panicked");
            }
            info!("Group index stopped");
        }
    }

    fn enqueue(&self, item: WorkItem) -> Result<()> {
        self.queue.send(item).map_err(|_| Error::ChannelClosed {
            context: "index worker is not running".to_string(),
        })
    }
}

impl Drop for IndexService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
