//! Configuration Module
//!
//! Handles loading and managing engine configuration from environment variables.

use std::env;

use crate::cache::EvictionPolicy;

/// Engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries the memory tier can hold
    pub max_items: usize,
    /// Maximum total payload bytes the memory tier can hold
    pub max_bytes: usize,
    /// Default TTL in seconds for entries without an explicit or strategy TTL
    pub default_ttl: u64,
    /// Eviction policy used when limits are exceeded
    pub eviction_policy: EvictionPolicy,
    /// Background expiry sweep interval in seconds
    pub sweep_interval: u64,
    /// Number of keys removed per write-lock acquisition during a sweep
    pub sweep_batch_size: usize,
    /// Fraction of the limits the sweep evicts down to when they are exceeded
    pub target_utilization: f64,
    /// Maximum number of pending writes held in the offline queue
    pub max_offline_queue: usize,
    /// Replay attempts per queued write before it is dropped
    pub max_replay_retries: u32,
    /// Offline queue replay interval in seconds
    pub replay_interval: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ITEMS` - Maximum cache entries (default: 1000)
    /// - `CACHE_MAX_BYTES` - Maximum total payload bytes (default: 64 MiB)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_EVICTION_POLICY` - `lru`, `lfu`, `fifo`, or `random` (default: lru)
    /// - `CACHE_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `CACHE_SWEEP_BATCH_SIZE` - Keys removed per sweep batch (default: 128)
    /// - `CACHE_TARGET_UTILIZATION` - Post-sweep eviction target (default: 0.8)
    /// - `CACHE_OFFLINE_QUEUE_MAX` - Offline queue capacity (default: 256)
    /// - `CACHE_REPLAY_RETRIES` - Replay attempts per queued write (default: 3)
    /// - `CACHE_REPLAY_INTERVAL` - Replay frequency in seconds (default: 15)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_items: env::var("CACHE_MAX_ITEMS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_items),
            max_bytes: env::var("CACHE_MAX_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_bytes),
            default_ttl: env::var("CACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
            eviction_policy: env::var("CACHE_EVICTION_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.eviction_policy),
            sweep_interval: env::var("CACHE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_interval),
            sweep_batch_size: env::var("CACHE_SWEEP_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_batch_size),
            target_utilization: env::var("CACHE_TARGET_UTILIZATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|r| (0.0..=1.0).contains(r))
                .unwrap_or(defaults.target_utilization),
            max_offline_queue: env::var("CACHE_OFFLINE_QUEUE_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_offline_queue),
            max_replay_retries: env::var("CACHE_REPLAY_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_replay_retries),
            replay_interval: env::var("CACHE_REPLAY_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.replay_interval),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_items: 1000,
            max_bytes: 64 * 1024 * 1024,
            default_ttl: 300,
            eviction_policy: EvictionPolicy::Lru,
            sweep_interval: 60,
            sweep_batch_size: 128,
            target_utilization: 0.8,
            max_offline_queue: 256,
            max_replay_retries: 3,
            replay_interval: 15,
        }
    }
}
