//! Cache Statistics Module
//!
//! Tracks cache performance metrics: hits, misses, sets, deletes,
//! evictions, expirations, and offline queue activity. Counters accumulate
//! monotonically; derived values like the hit rate are computed lazily on
//! read.

use serde::Serialize;

// == Cache Statistics ==
/// Accumulated cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStatistics {
    /// Number of reads served from the memory tier
    pub hits: u64,
    /// Number of reads that found no valid local entry
    pub misses: u64,
    /// Number of entries stored
    pub sets: u64,
    /// Number of entries explicitly removed
    pub deletes: u64,
    /// Number of entries evicted to satisfy limits
    pub evictions: u64,
    /// Number of expired entries removed (lazily or by the sweep)
    pub expirations: u64,
    /// Current number of entries in the memory tier
    pub total_entries: usize,
    /// Current total payload bytes in the memory tier
    pub total_bytes: usize,
    /// Current number of writes pending replay
    pub offline_queue_depth: usize,
    /// Number of queued writes dropped (overflow or exhausted retries)
    pub offline_queue_dropped: u64,
}

impl CacheStatistics {
    // == Constructor ==
    /// Creates a new CacheStatistics with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Recorders ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Increments the set counter.
    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    /// Increments the delete counter.
    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    /// Increments the eviction counter.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Increments the expiration counter.
    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }
}
