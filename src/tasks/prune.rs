//! Prune Task
//!
//! Background task that periodically removes expired cache entries.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;
use crate::file::{FileCache, FileReader};

/// Anything whose expired entries can be actively removed.
pub trait Prune: Send + Sync {
    /// Removes expired entries, returning how many were dropped.
    fn prune(&self) -> usize;
}

impl<K, V> Prune for CacheStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn prune(&self) -> usize {
        CacheStore::prune(self)
    }
}

impl<R: FileReader> Prune for FileCache<R> {
    fn prune(&self) -> usize {
        FileCache::prune(self)
    }
}

/// Spawns a background task that periodically prunes expired entries.
///
/// The engine runs no threads of its own; this task is opt-in. It sleeps for
/// `interval` between runs and holds the cache's write lock only while pruning.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CacheStore::<String, String>::new(1000, Duration::from_secs(300)));
/// let prune_handle = spawn_prune_task(cache.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// prune_handle.abort();
/// ```
pub fn spawn_prune_task<P>(cache: Arc<P>, interval: Duration) -> JoinHandle<()>
where
    P: Prune + ?Sized + 'static,
{
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting prune task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.prune();
            if removed > 0 {
                info!("Prune: removed {} expired entries", removed);
            } else {
                debug!("Prune: no expired entries found");
            }
        }
    })
}
