//! Sequential index worker
//!
//! All catalog work runs on one thread, pulling `WorkItem`s off an
//! unbounded queue in arrival order. Hooks and timers only enqueue, so
//! callers never wait on a merge pass, and two passes never touch the same
//! catalog at once.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::coordinator::{AggregationCoordinator, PassReport};
use crate::error::Result;
use crate::store::{RepositoryKey, RepositoryType};

/// Unit of work for the index worker
#[derive(Debug)]
pub enum WorkItem {
    /// A file was stored in a repository
    ContentWritten { key: RepositoryKey, path: String },
    /// Repositories were created or their definitions changed
    RepositoriesAdded(Vec<RepositoryKey>),
    /// Repositories of one type were deleted
    RepositoriesDeleted {
        repo_type: RepositoryType,
        names: Vec<String>,
    },
    /// A refresh timer fired
    Expired(RepositoryKey),
    /// Acknowledge once everything queued before it has been processed
    Flush(Sender<()>),
    Shutdown,
}

/// Work that produces a pass report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    RepositoriesAdded(Vec<RepositoryKey>),
    RepositoriesDeleted {
        repo_type: RepositoryType,
        names: Vec<String>,
    },
    Expired(RepositoryKey),
}

/// Completed work, as seen by subscribers
#[derive(Debug, Clone)]
pub struct WorkOutcome {
    pub trigger: Trigger,
    pub report: PassReport,
}

/// Listeners for completed work. Disconnected listeners are dropped.
pub type Subscribers = Arc<Mutex<Vec<Sender<WorkOutcome>>>>;

/// Start the worker thread.
pub fn spawn(
    coordinator: AggregationCoordinator,
    queue: Receiver<WorkItem>,
    subscribers: Subscribers,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("group-index-worker".to_string())
        .spawn(move || run(&coordinator, &queue, &subscribers))?;
    Ok(handle)
}

fn run(coordinator: &AggregationCoordinator, queue: &Receiver<WorkItem>, subscribers: &Subscribers) {
    for item in queue.iter() {
        let trigger = match item {
            WorkItem::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            WorkItem::Shutdown => break,
            WorkItem::ContentWritten { key, path } => {
                coordinator.content_written(&key, &path);
                continue;
            }
            WorkItem::RepositoriesAdded(keys) => Trigger::RepositoriesAdded(keys),
            WorkItem::RepositoriesDeleted { repo_type, names } => {
                Trigger::RepositoriesDeleted { repo_type, names }
            }
            WorkItem::Expired(key) => Trigger::Expired(key),
        };

        // A panicking pass must not take the worker down with it. Its
        // catalogs are released by their Drop impls during unwinding.
        match panic::catch_unwind(AssertUnwindSafe(|| dispatch(coordinator, &trigger))) {
            Ok(report) => publish(subscribers, WorkOutcome { trigger, report }),
            Err(_) => error!("Index update for {:?} panicked; continuing with next item", trigger),
        }
    }
    debug!("Index worker stopped");
}

fn dispatch(coordinator: &AggregationCoordinator, trigger: &Trigger) -> PassReport {
    match trigger {
        Trigger::RepositoriesAdded(keys) => coordinator.repositories_added(keys),
        Trigger::RepositoriesDeleted { repo_type, names } => {
            coordinator.repositories_deleted(*repo_type, names)
        }
        Trigger::Expired(key) => coordinator.expired(key),
    }
}

fn publish(subscribers: &Subscribers, outcome: WorkOutcome) {
    match subscribers.lock() {
        Ok(mut listeners) => listeners.retain(|l| l.send(outcome.clone()).is_ok()),
        Err(_) => error!("Work outcome subscribers lock poisoned"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_publish_drops_disconnected_listeners() {
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));
        let (live, live_rx) = unbounded();
        let (gone, gone_rx) = unbounded();
        subscribers.lock().unwrap().push(live);
        subscribers.lock().unwrap().push(gone);
        drop(gone_rx);

        publish(
            &subscribers,
            WorkOutcome {
                trigger: Trigger::Expired(RepositoryKey::group("g")),
                report: PassReport::default(),
            },
        );

        assert_eq!(subscribers.lock().unwrap().len(), 1);
        assert_eq!(
            live_rx.try_recv().unwrap().trigger,
            Trigger::Expired(RepositoryKey::group("g"))
        );
    }
}
