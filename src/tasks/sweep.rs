//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries and
//! re-enforces the store's limits.
//!
//! The sweep never holds the exclusive lock for its whole duration: expired
//! keys are snapshotted under a read lock, then removed in small batches,
//! each under its own short write lock. Keys re-set between the snapshot
//! and the removal are rechecked and left alone.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::events::{CacheEvent, CacheObserver};
use crate::persist::PersistentTier;

/// Spawns a background task that periodically sweeps expired entries and,
/// when limits are still exceeded afterwards, evicts down to the target
/// utilization.
///
/// # Arguments
/// * `store` - Shared reference to the cache store
/// * `persistent` - Optional persistent tier, pruned alongside the store
/// * `interval_secs` - Interval in seconds between sweep runs
/// * `batch_size` - Keys removed per write-lock acquisition
/// * `target_utilization` - Fraction of the limits to evict down to
/// * `observers` - Observers notified of expirations and evictions
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_sweep_task(
    store: Arc<RwLock<CacheStore>>,
    persistent: Option<Arc<PersistentTier>>,
    interval_secs: u64,
    batch_size: usize,
    target_utilization: f64,
    observers: Arc<Vec<Arc<dyn CacheObserver>>>,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));
    let batch_size = batch_size.max(1);

    tokio::spawn(async move {
        info!(
            "starting expiry sweep task with interval of {} seconds",
            interval_secs.max(1)
        );

        loop {
            tokio::time::sleep(interval).await;

            // Snapshot candidates under a read lock
            let candidates = { store.read().await.expired_keys() };

            let mut removed = Vec::new();
            for chunk in candidates.chunks(batch_size) {
                let mut dropped = { store.write().await.remove_expired_batch(chunk) };
                removed.append(&mut dropped);
            }

            for key in &removed {
                for observer in observers.iter() {
                    observer.on_event(&CacheEvent::Expired { key: key.clone() });
                }
            }

            // Prune only the entries actually removed from memory
            if let Some(tier) = &persistent {
                for key in &removed {
                    if let Err(err) = tier.remove(key).await {
                        warn!("failed to prune persisted entry '{}': {}", key, err);
                    }
                }
            }

            let evicted = { store.write().await.enforce_target(target_utilization) };
            for key in &evicted {
                for observer in observers.iter() {
                    observer.on_event(&CacheEvent::Evicted { key: key.clone() });
                }
            }

            if !removed.is_empty() || !evicted.is_empty() {
                info!(
                    "expiry sweep removed {} expired and {} evicted entries",
                    removed.len(),
                    evicted.len()
                );
            } else {
                debug!("expiry sweep: nothing to do");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, EvictionPolicy};
    use std::collections::HashSet;

    fn short_lived(ttl_seconds: u64) -> CacheEntry {
        CacheEntry::new(b"value".to_vec(), false, Some(ttl_seconds), HashSet::new())
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let store = Arc::new(RwLock::new(CacheStore::new(
            100,
            1024 * 1024,
            EvictionPolicy::Lru,
        )));

        {
            let mut guard = store.write().await;
            guard.insert("expire_soon".to_string(), short_lived(1));
            guard.insert("long_lived".to_string(), short_lived(3600));
        }

        let handle = spawn_sweep_task(store.clone(), None, 1, 16, 0.8, Arc::new(Vec::new()));

        // Wait for the entry to expire and a sweep to run
        tokio::time::sleep(Duration::from_millis(2500)).await;

        {
            let guard = store.read().await;
            assert!(guard.peek("expire_soon").is_none(), "expired entry swept");
            assert!(guard.peek("long_lived").is_some(), "valid entry preserved");
            assert_eq!(guard.statistics().expirations, 1);
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_prunes_persistent_tier() {
        use crate::persist::StoredEntry;

        let dir = tempfile::tempdir().unwrap();
        let tier = Arc::new(PersistentTier::new(dir.path()));
        let store = Arc::new(RwLock::new(CacheStore::new(
            100,
            1024 * 1024,
            EvictionPolicy::Lru,
        )));

        let entry = short_lived(1);
        tier.store(&StoredEntry::from_entry("expire_soon", &entry))
            .await
            .unwrap();
        store
            .write()
            .await
            .insert("expire_soon".to_string(), entry);

        let handle = spawn_sweep_task(
            store.clone(),
            Some(tier.clone()),
            1,
            16,
            0.8,
            Arc::new(Vec::new()),
        );

        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(store.read().await.peek("expire_soon").is_none());
        assert!(tier.load("expire_soon").await.unwrap().is_none());

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let store = Arc::new(RwLock::new(CacheStore::new(
            100,
            1024 * 1024,
            EvictionPolicy::Lru,
        )));

        let handle = spawn_sweep_task(store, None, 1, 16, 0.8, Arc::new(Vec::new()));

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "task should be finished after abort");
    }
}
