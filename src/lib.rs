//! Layercache - A resilient multi-tier caching engine
//!
//! Provides an in-memory cache with TTL expiration, pluggable eviction,
//! tag-based invalidation, an optional remote tier, a durable local tier,
//! and an offline write queue replayed once connectivity returns.

pub mod cache;
pub mod compress;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod persist;
pub mod queue;
pub mod remote;
pub mod tasks;

pub use cache::{
    CacheEntry, CacheStatistics, CacheStore, CacheStrategy, EvictionPolicy, StrategyRegistry,
};
pub use config::CacheConfig;
pub use engine::{CacheEngine, CacheEngineBuilder, EngineTasks, SetOptions};
pub use error::{CacheError, Result};
pub use events::{CacheEvent, CacheObserver};
pub use persist::{PersistentTier, StoredEntry};
pub use queue::{OfflineQueue, QueuedWrite};
pub use remote::{DistributedAdapter, InMemoryAdapter, RemoteError, RemoteResult};
pub use tasks::{spawn_replay_task, spawn_sweep_task};
