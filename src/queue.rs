//! Offline Queue Module
//!
//! Captures writes that failed to reach the remote tier due to connectivity
//! loss and replays them once connectivity returns. The queue is FIFO and
//! bounded: enqueuing beyond capacity drops the oldest pending item, with a
//! log entry and a counter increment so no write disappears silently.
//!
//! Replay is strictly sequential to preserve submission order. A failed
//! attempt leaves the item at the front for the next cycle (at-least-once
//! semantics) until its retries are exhausted, at which point it is dropped
//! with a visible signal.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::remote::DistributedAdapter;

// == Queued Write ==
/// A replayable write descriptor.
#[derive(Debug, Clone)]
pub enum QueuedWrite {
    /// Store a payload under a key with an optional TTL in seconds
    Set {
        key: String,
        payload: Vec<u8>,
        ttl_seconds: Option<u64>,
    },
    /// Remove a key
    Delete { key: String },
}

impl QueuedWrite {
    /// Returns the key this write targets.
    pub fn key(&self) -> &str {
        match self {
            QueuedWrite::Set { key, .. } => key,
            QueuedWrite::Delete { key } => key,
        }
    }
}

// == Queue Item ==
/// A queued write plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// The write to replay
    pub write: QueuedWrite,
    /// Enqueue timestamp (Unix milliseconds)
    pub enqueued_at: u64,
    /// Number of failed replay attempts so far
    pub retry_count: u32,
}

// == Replay Report ==
/// Outcome of one replay cycle.
#[derive(Debug, Default)]
pub struct ReplayReport {
    /// Number of writes successfully delivered
    pub replayed: usize,
    /// Keys of writes dropped after exhausting their retries
    pub dropped: Vec<String>,
}

// == Offline Queue ==
/// Bounded FIFO buffer of writes pending remote delivery.
#[derive(Debug)]
pub struct OfflineQueue {
    items: Mutex<VecDeque<QueueItem>>,
    max_size: usize,
    max_retries: u32,
    enqueued: AtomicU64,
    replayed: AtomicU64,
    dropped: AtomicU64,
}

impl OfflineQueue {
    // == Constructor ==
    /// Creates a queue holding at most `max_size` items, each replayed at
    /// most `max_retries` times.
    pub fn new(max_size: usize, max_retries: u32) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            max_size: max_size.max(1),
            max_retries: max_retries.max(1),
            enqueued: AtomicU64::new(0),
            replayed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    // == Enqueue ==
    /// Appends a write, dropping the oldest pending item on overflow.
    pub async fn enqueue(&self, write: QueuedWrite) {
        let mut items = self.items.lock().await;
        if items.len() >= self.max_size {
            if let Some(oldest) = items.pop_front() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "offline queue full, dropping oldest pending write for '{}'",
                    oldest.write.key()
                );
            }
        }
        items.push_back(QueueItem {
            write,
            enqueued_at: current_timestamp_ms(),
            retry_count: 0,
        });
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    // == Replay ==
    /// Replays pending writes front-to-back against the adapter.
    ///
    /// Stops at the first item that fails without exhausting its retries,
    /// leaving it in place for the next cycle so submission order is never
    /// violated. Items that exhaust their retries are dropped and reported.
    pub async fn replay(&self, adapter: &dyn DistributedAdapter) -> ReplayReport {
        let mut report = ReplayReport::default();

        loop {
            let mut items = self.items.lock().await;
            let Some(item) = items.front_mut() else {
                break;
            };

            let result = match &item.write {
                QueuedWrite::Set {
                    key,
                    payload,
                    ttl_seconds,
                } => adapter.set(key, payload, *ttl_seconds).await,
                QueuedWrite::Delete { key } => adapter.delete(key).await,
            };

            match result {
                Ok(()) => {
                    items.pop_front();
                    self.replayed.fetch_add(1, Ordering::Relaxed);
                    report.replayed += 1;
                }
                Err(err) => {
                    item.retry_count += 1;
                    if item.retry_count >= self.max_retries {
                        let key = item.write.key().to_string();
                        warn!(
                            "dropping queued write for '{}' after {} failed attempts: {}",
                            key, item.retry_count, err
                        );
                        items.pop_front();
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        report.dropped.push(key);
                        // A non-connectivity failure can be item-specific,
                        // so the next item still gets its attempt
                        continue;
                    }
                    debug!(
                        "replay attempt {} for '{}' failed, leaving in queue: {}",
                        item.retry_count,
                        item.write.key(),
                        err
                    );
                    break;
                }
            }
        }

        report
    }

    // == Length ==
    /// Returns the number of pending writes.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Returns true if no writes are pending.
    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    // == Counters ==
    /// Total writes ever enqueued.
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Total writes successfully replayed.
    pub fn replayed_count(&self) -> u64 {
        self.replayed.load(Ordering::Relaxed)
    }

    /// Total writes dropped, by overflow or by exhausted retries.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
