//! TTL Cleanup Task
//!
//! Background task that periodically removes expired volatile entries, for
//! long-running processes that should not wait for the next read of a key.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::VolatileStore;

/// Spawns a background task that periodically cleans up expired entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between cleanup runs. Each run takes the store lock once.
///
/// # Arguments
/// * `store` - Handle to the volatile store
/// * `interval` - Time between cleanup runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let store = VolatileStore::<String>::new();
/// let cleanup_handle = spawn_cleanup_task(store.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(store: VolatileStore<V>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.cleanup();

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let store: VolatileStore<String> = VolatileStore::with_config(CacheConfig::default());

        // set off-runtime so no expiry timer is armed and only the sweep can remove it
        std::thread::scope(|s| {
            s.spawn(|| {
                store.set("expire_soon", "value".to_string(), Some(Duration::from_millis(50)))
            });
        });
        assert_eq!(store.len(), 1);

        let handle = spawn_cleanup_task(store.clone(), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(store.len(), 0, "Expired entry should have been cleaned up");
        assert_eq!(store.stats().counters.expirations, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let store: VolatileStore<String> = VolatileStore::new();
        store.set("long_lived", "value".to_string(), Some(Duration::from_secs(3600)));

        let handle = spawn_cleanup_task(store.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.get("long_lived"), Some("value".to_string()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let store: VolatileStore<String> = VolatileStore::new();

        let handle = spawn_cleanup_task(store, Duration::from_secs(1));

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
