//! # Refresh Scheduling
//!
//! Catalog staleness is bounded by expiration timers. A group gets a long
//! timer after each merge pass; a hosted repository gets a short debounce
//! timer on the first write since its last scan. When a timer fires the
//! scheduler hands the expiration to a callback, which only enqueues work;
//! no aggregation runs on the timer thread.
//!
//! ## Invariants
//!
//! - At most one armed timer per `ExpirationKey`. Scheduling a key that is
//!   already armed is a no-op.
//! - A cancelled or superseded timer never fires. Every arm gets a
//!   generation number and the timer thread only fires an entry whose
//!   generation is still the armed one.

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use log::{debug, error, info};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::store::{RepositoryKey, RepositoryType};

/// Namespaced timer identity: `prefix:type:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpirationKey {
    pub prefix: String,
    pub repo_type: RepositoryType,
    pub name: String,
}

impl ExpirationKey {
    pub fn new(prefix: &str, repo_type: RepositoryType, name: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            repo_type,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ExpirationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.prefix, self.repo_type, self.name)
    }
}

/// A timer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiration {
    pub key: ExpirationKey,
    pub timeout: Duration,
    /// Repository to refresh when the timer fires
    pub payload: RepositoryKey,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    generation: u64,
    expires: DateTime<Utc>,
}

enum Command {
    Arm {
        expiration: Expiration,
        generation: u64,
    },
    Disarm(ExpirationKey),
    Shutdown,
}

/// Stand-in deadline for timeouts too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

type ExpireCallback = Box<dyn Fn(Expiration) + Send + 'static>;

/// Timer service for catalog refreshes
pub struct RefreshScheduler {
    prefix: String,
    group_ttl: Duration,
    hosted_ttl: Duration,
    armed: Arc<Mutex<HashMap<ExpirationKey, Armed>>>,
    next_generation: Mutex<u64>,
    commands: Sender<Command>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    /// Start the timer thread. `on_expire` runs on that thread for every
    /// timer that fires and must not block.
    pub fn start<F>(prefix: &str, group_ttl: Duration, hosted_ttl: Duration, on_expire: F) -> Result<Self>
    where
        F: Fn(Expiration) + Send + 'static,
    {
        let (commands, receiver) = unbounded();
        let armed = Arc::new(Mutex::new(HashMap::new()));
        let timer = TimerLoop {
            prefix: prefix.to_string(),
            armed: Arc::clone(&armed),
            pending: BTreeMap::new(),
            on_expire: Box::new(on_expire),
        };

        let handle = thread::Builder::new()
            .name("group-index-scheduler".to_string())
            .spawn(move || timer.run(receiver))?;

        Ok(Self {
            prefix: prefix.to_string(),
            group_ttl,
            hosted_ttl,
            armed,
            next_generation: Mutex::new(0),
            commands,
            thread: Mutex::new(Some(handle)),
        })
    }

    pub fn expiration_for_group(&self, name: &str) -> Expiration {
        Expiration {
            key: ExpirationKey::new(&self.prefix, RepositoryType::Group, name),
            timeout: self.group_ttl,
            payload: RepositoryKey::group(name),
        }
    }

    pub fn expiration_for_hosted(&self, name: &str) -> Expiration {
        Expiration {
            key: ExpirationKey::new(&self.prefix, RepositoryType::Hosted, name),
            timeout: self.hosted_ttl,
            payload: RepositoryKey::hosted(name),
        }
    }

    /// Whether a timer for `key` is armed.
    pub fn contains(&self, key: &ExpirationKey) -> Result<bool> {
        Ok(self.lock_armed()?.contains_key(key))
    }

    /// When the timer for `key` fires, if armed.
    pub fn expires_at(&self, key: &ExpirationKey) -> Result<Option<DateTime<Utc>>> {
        Ok(self.lock_armed()?.get(key).map(|a| a.expires))
    }

    /// Number of armed timers.
    pub fn armed_count(&self) -> Result<usize> {
        Ok(self.lock_armed()?.len())
    }

    /// Arm a timer unless one is already armed for the same key.
    ///
    /// Returns whether a new timer was armed.
    pub fn schedule(&self, expiration: Expiration) -> Result<bool> {
        let mut armed = self.lock_armed()?;
        if armed.contains_key(&expiration.key) {
            return Ok(false);
        }

        let generation = {
            let mut next = self.next_generation.lock().map_err(|_| Error::LockPoisoned {
                context: "scheduler generation".to_string(),
            })?;
            *next += 1;
            *next
        };
        let expires = chrono::Duration::from_std(expiration.timeout)
            .ok()
            .and_then(|timeout| Utc::now().checked_add_signed(timeout))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let key = expiration.key.clone();
        self.commands
            .send(Command::Arm {
                expiration,
                generation,
            })
            .map_err(|_| Error::Scheduling {
                key: key.to_string(),
                message: "scheduler thread has stopped".to_string(),
            })?;
        armed.insert(key, Armed { generation, expires });
        Ok(true)
    }

    /// Disarm the timer for `key`. Returns whether one was armed.
    pub fn cancel(&self, key: &ExpirationKey) -> Result<bool> {
        let mut armed = self.lock_armed()?;
        if armed.remove(key).is_none() {
            return Ok(false);
        }
        self.commands
            .send(Command::Disarm(key.clone()))
            .map_err(|_| Error::Scheduling {
                key: key.to_string(),
                message: "scheduler thread has stopped".to_string(),
            })?;
        Ok(true)
    }

    /// Arm the staleness timer for a group and log when it will fire.
    pub fn schedule_group_refresh(&self, name: &str) -> Result<bool> {
        let expiration = self.expiration_for_group(name);
        let key = expiration.key.clone();
        let armed = self.schedule(expiration)?;
        if let Some(expires) = self.expires_at(&key)? {
            info!("Next index update in group: {} scheduled for: {}", name, expires);
        }
        Ok(armed)
    }

    /// Arm the debounce timer for a hosted repository.
    pub fn schedule_hosted_refresh(&self, name: &str) -> Result<bool> {
        let armed = self.schedule(self.expiration_for_hosted(name))?;
        if armed {
            debug!("Index update for hosted repository: {} scheduled in {:?}", name, self.hosted_ttl);
        }
        Ok(armed)
    }

    /// Stop refreshing a group.
    pub fn cancel_group_refresh(&self, name: &str) -> Result<bool> {
        self.cancel(&ExpirationKey::new(&self.prefix, RepositoryType::Group, name))
    }

    /// Stop the timer thread. Armed timers are dropped without firing.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        let handle = match self.thread.lock() {
            Ok(mut thread) => thread.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Scheduler thread panicked");
            }
        }
    }

    fn lock_armed(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ExpirationKey, Armed>>> {
        self.armed.lock().map_err(|_| Error::LockPoisoned {
            context: "scheduler timers".to_string(),
        })
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct TimerLoop {
    prefix: String,
    armed: Arc<Mutex<HashMap<ExpirationKey, Armed>>>,
    pending: BTreeMap<(Instant, u64), Expiration>,
    on_expire: ExpireCallback,
}

impl TimerLoop {
    fn run(mut self, receiver: crossbeam_channel::Receiver<Command>) {
        loop {
            let command = match self.pending.keys().next().copied() {
                Some((deadline, _)) => match receiver.recv_deadline(deadline) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return,
                },
                None => match receiver.recv() {
                    Ok(command) => Some(command),
                    Err(_) => return,
                },
            };

            match command {
                Some(Command::Arm {
                    expiration,
                    generation,
                }) => {
                    let now = Instant::now();
                    let deadline = now
                        .checked_add(expiration.timeout)
                        .unwrap_or(now + FAR_FUTURE);
                    self.pending.insert((deadline, generation), expiration);
                }
                Some(Command::Disarm(key)) => self.pending.retain(|_, e| e.key != key),
                Some(Command::Shutdown) => return,
                None => self.fire_due(),
            }
        }
    }

    fn fire_due(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.pending.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, generation), expiration) = entry.remove_entry();

            let current = match self.armed.lock() {
                Ok(mut armed) => {
                    let current = armed
                        .get(&expiration.key)
                        .is_some_and(|a| a.generation == generation);
                    if current {
                        armed.remove(&expiration.key);
                    }
                    current
                }
                Err(_) => {
                    error!("Scheduler timer table poisoned; dropping {}", expiration.key);
                    false
                }
            };
            if !current {
                continue;
            }

            if expiration.key.prefix != self.prefix {
                debug!("Ignoring expiration outside our namespace: {}", expiration.key);
                continue;
            }

            debug!("Expired: {}", expiration.key);
            (self.on_expire)(expiration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver;

    const SHORT: Duration = Duration::from_millis(50);
    const WAIT: Duration = Duration::from_secs(5);

    fn scheduler(group_ttl: Duration, hosted_ttl: Duration) -> (RefreshScheduler, Receiver<Expiration>) {
        let (tx, rx) = unbounded();
        let scheduler = RefreshScheduler::start("test-index", group_ttl, hosted_ttl, move |e| {
            let _ = tx.send(e);
        })
        .unwrap();
        (scheduler, rx)
    }

    #[test]
    fn test_expiration_key_display() {
        let key = ExpirationKey::new("test-index", RepositoryType::Group, "public");
        assert_eq!(key.to_string(), "test-index:group:public");
    }

    #[test]
    fn test_hosted_timer_fires_with_payload() {
        let (scheduler, rx) = scheduler(Duration::from_secs(3600), SHORT);
        assert!(scheduler.schedule_hosted_refresh("local").unwrap());

        let fired = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(fired.payload, RepositoryKey::hosted("local"));
        assert!(!scheduler.contains(&fired.key).unwrap());
    }

    #[test]
    fn test_schedule_twice_fires_once() {
        let (scheduler, rx) = scheduler(SHORT, SHORT);
        assert!(scheduler.schedule_group_refresh("public").unwrap());
        assert!(!scheduler.schedule_group_refresh("public").unwrap());
        assert_eq!(scheduler.armed_count().unwrap(), 1);

        rx.recv_timeout(WAIT).unwrap();
        assert!(rx.recv_timeout(SHORT * 4).is_err());
    }

    #[test]
    fn test_rearm_after_fire() {
        let (scheduler, rx) = scheduler(SHORT, SHORT);
        scheduler.schedule_group_refresh("public").unwrap();
        rx.recv_timeout(WAIT).unwrap();

        assert!(scheduler.schedule_group_refresh("public").unwrap());
        rx.recv_timeout(WAIT).unwrap();
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let (scheduler, rx) = scheduler(SHORT, SHORT);
        scheduler.schedule_group_refresh("public").unwrap();
        assert!(scheduler.cancel_group_refresh("public").unwrap());
        assert!(!scheduler.cancel_group_refresh("public").unwrap());

        assert!(rx.recv_timeout(SHORT * 4).is_err());
        assert_eq!(scheduler.armed_count().unwrap(), 0);
    }

    #[test]
    fn test_cancel_then_reschedule_fires_once() {
        let (scheduler, rx) = scheduler(SHORT, SHORT);
        scheduler.schedule_group_refresh("public").unwrap();
        scheduler.cancel_group_refresh("public").unwrap();
        scheduler.schedule_group_refresh("public").unwrap();

        rx.recv_timeout(WAIT).unwrap();
        assert!(rx.recv_timeout(SHORT * 4).is_err());
    }

    #[test]
    fn test_foreign_prefix_is_ignored() {
        let (scheduler, rx) = scheduler(SHORT, SHORT);
        let expiration = Expiration {
            key: ExpirationKey::new("other", RepositoryType::Group, "public"),
            timeout: SHORT,
            payload: RepositoryKey::group("public"),
        };
        assert!(scheduler.schedule(expiration).unwrap());
        assert!(rx.recv_timeout(SHORT * 4).is_err());
    }

    #[test]
    fn test_schedule_after_shutdown_is_scheduling_error() {
        let (scheduler, _rx) = scheduler(SHORT, SHORT);
        scheduler.shutdown();
        let err = scheduler.schedule_group_refresh("public").unwrap_err();
        assert!(matches!(err, Error::Scheduling { .. }));
    }
}
