//! Per-key refresh locks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::debug;

type LockMap = DashMap<String, Arc<Semaphore>>;

/// Registry of exclusive-access primitives, one per key.
///
/// A key's lock is created on first use and shared by every caller that
/// names the same string, regardless of the value type they cache under it.
/// The lock holds no data; it only serializes the refresh section for its key.
///
/// Lookups go through a sharded map, so unrelated keys never contend on a
/// registry-wide lock.
///
/// By default entries are kept forever, which is fine for bounded key sets.
/// For high-cardinality key spaces enable pruning with
/// [`KeyLockRegistry::with_pruning`] or call [`KeyLockRegistry::prune_idle`]
/// periodically.
#[derive(Clone, Default)]
pub struct KeyLockRegistry {
    locks: Arc<LockMap>,
    prune_on_release: bool,
}

impl KeyLockRegistry {
    /// Creates a registry that never drops entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that drops a key's entry when the last guard or
    /// waiter for it goes away.
    pub fn with_pruning() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            prune_on_release: true,
        }
    }

    /// Tries to take the lock for `key`, waiting at most `wait`.
    ///
    /// A zero `wait` makes a single non-blocking attempt. Returns `None` if
    /// the lock could not be obtained in time. Giving up does not affect the
    /// current holder.
    ///
    /// The lock is released when the returned guard is dropped.
    pub async fn try_acquire(&self, key: &str, wait: Duration) -> Option<KeyLockGuard> {
        let semaphore = self.lock_for(key);

        let permit = if wait.is_zero() {
            Arc::clone(&semaphore).try_acquire_owned().ok()
        } else {
            // The semaphore is never closed, so only the timeout can fail here.
            timeout(wait, Arc::clone(&semaphore).acquire_owned())
                .await
                .ok()
                .and_then(Result::ok)
        };

        match permit {
            Some(permit) => Some(KeyLockGuard {
                key: key.to_owned(),
                permit: Some(permit),
                semaphore: Some(semaphore),
                locks: Arc::clone(&self.locks),
                prune_on_release: self.prune_on_release,
            }),
            None => {
                drop(semaphore);
                if self.prune_on_release {
                    remove_if_idle(&self.locks, key);
                }
                debug!(key = %key, ?wait, "refresh lock not acquired");
                None
            },
        }
    }

    /// Returns true if some caller currently holds the lock for `key`.
    pub fn is_locked(&self, key: &str) -> bool {
        self.locks
            .get(key)
            .map(|semaphore| semaphore.available_permits() == 0)
            .unwrap_or(false)
    }

    /// Number of keys with a lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no key has a lock entry.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Removes every entry that nobody holds or waits on.
    ///
    /// Returns the number of entries removed.
    pub fn prune_idle(&self) -> usize {
        let before = self.locks.len();
        // The map's own reference is the only one left when no guard or waiter exists.
        self.locks
            .retain(|_, semaphore| Arc::strong_count(semaphore) > 1);
        let removed = before.saturating_sub(self.locks.len());

        if removed > 0 {
            debug!(removed, remaining = self.locks.len(), "pruned idle refresh locks");
        }
        removed
    }

    /// Get-or-create. Concurrent first-time callers end up with the same primitive.
    fn lock_for(&self, key: &str) -> Arc<Semaphore> {
        if let Some(existing) = self.locks.get(key) {
            return Arc::clone(existing.value());
        }

        Arc::clone(
            self.locks
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .value(),
        )
    }
}

impl fmt::Debug for KeyLockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLockRegistry")
            .field("keys", &self.locks.len())
            .field("prune_on_release", &self.prune_on_release)
            .finish()
    }
}

/// Exclusive access to one key's refresh section.
///
/// Dropping the guard releases the lock exactly once, on every exit path,
/// including when the owning future is cancelled.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct KeyLockGuard {
    key: String,
    permit: Option<OwnedSemaphorePermit>,
    semaphore: Option<Arc<Semaphore>>,
    locks: Arc<LockMap>,
    prune_on_release: bool,
}

impl KeyLockGuard {
    /// Key this guard locks.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases the lock now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        drop(self.permit.take());
        drop(self.semaphore.take());

        if self.prune_on_release {
            remove_if_idle(&self.locks, &self.key);
        }
    }
}

/// Waiters and holders keep their own clone, so a count of one means only
/// the map still references the semaphore. Must run after the caller has
/// dropped its own clone.
fn remove_if_idle(locks: &LockMap, key: &str) {
    locks.remove_if(key, |_, semaphore| Arc::strong_count(semaphore) == 1);
}

impl fmt::Debug for KeyLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLockGuard").field("key", &self.key).finish()
    }
}
