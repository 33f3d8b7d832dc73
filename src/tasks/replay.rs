//! Offline Queue Replay Task
//!
//! Background task that drains the offline queue against the remote tier
//! at a fixed interval while connectivity is available. Items replay in
//! submission order; drops after exhausted retries surface as events.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::events::{CacheEvent, CacheObserver};
use crate::queue::OfflineQueue;
use crate::remote::DistributedAdapter;

/// Spawns a background task that replays queued writes at a fixed interval.
///
/// # Arguments
/// * `queue` - The offline queue to drain
/// * `remote` - The adapter the writes are replayed against
/// * `interval_secs` - Interval in seconds between replay cycles
/// * `observers` - Observers notified when a queued write is dropped
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_replay_task(
    queue: Arc<OfflineQueue>,
    remote: Arc<dyn DistributedAdapter>,
    interval_secs: u64,
    observers: Arc<Vec<Arc<dyn CacheObserver>>>,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "starting offline queue replay task with interval of {} seconds",
            interval_secs.max(1)
        );

        loop {
            tokio::time::sleep(interval).await;

            if queue.is_empty().await {
                debug!("offline queue replay: nothing pending");
                continue;
            }

            let report = queue.replay(remote.as_ref()).await;

            for key in &report.dropped {
                for observer in observers.iter() {
                    observer.on_event(&CacheEvent::ReplayDropped { key: key.clone() });
                }
            }

            if report.replayed > 0 {
                info!("replayed {} queued writes", report.replayed);
            }
        }
    })
}
