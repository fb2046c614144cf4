//! Per-link refresh serialization.
//!
//! Callers that find an expired token take the link's lock, re-read the
//! link, and only refresh when the token is still expired. A second caller
//! blocked on the same lock then sees the token the first one persisted.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Registry of async mutexes keyed by link id.
///
/// ```ignore
/// let _guard = locks.acquire(link.id).await;
/// let link = repo.find_by_id(link.id, LoadOptions::default()).await?;
/// if link.access_token_expired(clock.now()) {
///     // refresh and persist while holding the guard
/// }
/// ```
pub struct RefreshLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> RefreshLocks<K>
where
    K: Eq + Hash + Clone + Send,
{
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for exclusive refresh rights on `key`.
    ///
    /// The guard releases the lock when dropped.
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Self::prune_idle(&mut locks);
            locks
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }

    // An entry whose Arc is held only by the map has no holder or waiter.
    fn prune_idle(locks: &mut HashMap<K, Arc<Mutex<()>>>) {
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        if locks.len() != before {
            trace!(pruned = before - locks.len(), "Pruned idle refresh locks");
        }
    }
}

impl<K> Default for RefreshLocks<K>
where
    K: Eq + Hash + Clone + Send,
{
    fn default() -> Self {
        Self::new()
    }
}
