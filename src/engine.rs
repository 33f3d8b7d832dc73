//! Cache Engine Module
//!
//! The public facade over all tiers: the in-memory store, the optional
//! remote adapter, the optional persistent tier, and the offline write
//! queue. The engine is constructed explicitly once at process start and
//! passed by reference to consumers; there is no global instance.
//!
//! Locking discipline: every local operation completes and releases the
//! store lock before any remote or persistent I/O is awaited. Tier
//! failures on read/write paths degrade to local-only behavior and are
//! logged; only administrative operations (`clear`, `delete_by_tag`)
//! propagate tier failures to the caller.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{
    CacheEntry, CacheStatistics, CacheStore, CacheStrategy, StrategyRegistry, MAX_KEY_LENGTH,
};
use crate::compress;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::events::{CacheEvent, CacheObserver};
use crate::persist::{PersistentTier, StoredEntry};
use crate::queue::{OfflineQueue, QueuedWrite};
use crate::remote::DistributedAdapter;
use crate::tasks::{spawn_replay_task, spawn_sweep_task};

// == Set Options ==
/// Per-call overrides for `set`.
///
/// Explicit values win over the resolved strategy, which wins over engine
/// defaults.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// TTL in seconds
    pub ttl: Option<u64>,
    /// Tags merged with the strategy's tags
    pub tags: Vec<String>,
    /// Exact pattern of a registered strategy to apply, bypassing matching
    pub strategy: Option<String>,
    /// Force compression on or off
    pub compress: Option<bool>,
    /// Free-form metadata stored on the entry
    pub metadata: HashMap<String, Value>,
}

impl SetOptions {
    /// Creates empty options (strategy and engine defaults apply).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an explicit TTL in seconds.
    pub fn with_ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    /// Adds tags to the entry.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Applies the strategy registered under an exact pattern.
    pub fn with_strategy(mut self, pattern: impl Into<String>) -> Self {
        self.strategy = Some(pattern.into());
        self
    }

    /// Forces compression on or off for this entry.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    /// Attaches free-form metadata to the entry.
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

// == Write Plan ==
/// The resolved policy for one write: explicit options folded over the
/// matching strategy and engine defaults.
struct WritePlan {
    ttl_seconds: u64,
    tags: HashSet<String>,
    compress: bool,
    depends_on: HashSet<String>,
}

// == Cache Engine ==
/// Multi-tier caching engine.
///
/// Cheap to clone: all tiers are shared behind `Arc`s, so handlers and
/// background tasks can hold their own handle.
#[derive(Clone)]
pub struct CacheEngine {
    store: Arc<RwLock<CacheStore>>,
    registry: Arc<RwLock<StrategyRegistry>>,
    remote: Option<Arc<dyn DistributedAdapter>>,
    persistent: Option<Arc<PersistentTier>>,
    queue: Arc<OfflineQueue>,
    observers: Arc<Vec<Arc<dyn CacheObserver>>>,
    config: CacheConfig,
}

// == Engine Builder ==
/// Builds a [`CacheEngine`] with optional tiers and observers.
pub struct CacheEngineBuilder {
    config: CacheConfig,
    remote: Option<Arc<dyn DistributedAdapter>>,
    persistent: Option<PersistentTier>,
    observers: Vec<Arc<dyn CacheObserver>>,
}

impl CacheEngineBuilder {
    /// Starts a builder from a configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            remote: None,
            persistent: None,
            observers: Vec::new(),
        }
    }

    /// Attaches a remote adapter as the secondary tier.
    pub fn with_remote(mut self, adapter: Arc<dyn DistributedAdapter>) -> Self {
        self.remote = Some(adapter);
        self
    }

    /// Attaches a persistent tier rooted at `dir`.
    pub fn with_persistence_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persistent = Some(PersistentTier::new(dir));
        self
    }

    /// Attaches an already-constructed persistent tier.
    pub fn with_persistence(mut self, tier: PersistentTier) -> Self {
        self.persistent = Some(tier);
        self
    }

    /// Registers an observer. Observers fire in registration order.
    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Builds the engine.
    pub fn build(self) -> CacheEngine {
        let store = CacheStore::new(
            self.config.max_items,
            self.config.max_bytes,
            self.config.eviction_policy.clone(),
        );
        let queue = OfflineQueue::new(
            self.config.max_offline_queue,
            self.config.max_replay_retries,
        );
        CacheEngine {
            store: Arc::new(RwLock::new(store)),
            registry: Arc::new(RwLock::new(StrategyRegistry::new())),
            remote: self.remote,
            persistent: self.persistent.map(Arc::new),
            queue: Arc::new(queue),
            observers: Arc::new(self.observers),
            config: self.config,
        }
    }
}

impl CacheEngine {
    // == Constructors ==
    /// Creates a local-only engine (no remote or persistent tier).
    pub fn new(config: CacheConfig) -> Self {
        Self::builder(config).build()
    }

    /// Starts a builder for an engine with optional tiers.
    pub fn builder(config: CacheConfig) -> CacheEngineBuilder {
        CacheEngineBuilder::new(config)
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Get ==
    /// Retrieves a value, consulting memory, then the remote tier, then the
    /// persistent tier. Secondary-tier hits populate the memory tier before
    /// returning. Never fails for a miss; tier errors degrade to a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let local = { self.store.write().await.get(key) };
        if let Some(entry) = local {
            match decode_value::<T>(&entry.payload, entry.compressed) {
                Ok(value) => {
                    self.emit(CacheEvent::Hit {
                        key: key.to_string(),
                    });
                    return Some(value);
                }
                Err(err) => {
                    warn!(
                        "stored payload for '{}' failed to decode, treating as a miss: {}",
                        key, err
                    );
                    self.store.write().await.remove(key);
                }
            }
        }
        self.emit(CacheEvent::Miss {
            key: key.to_string(),
        });

        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(Some(bytes)) => {
                    if let Some(value) = self.adopt_remote::<T>(key, &bytes).await {
                        debug!("'{}' served from the remote tier", key);
                        return Some(value);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("remote get for '{}' failed, falling back: {}", key, err);
                }
            }
        }

        if let Some(tier) = &self.persistent {
            match tier.load(key).await {
                Ok(Some(stored)) if !stored.is_expired() => {
                    if let Some(value) = self.adopt::<T>(key, stored).await {
                        debug!("'{}' served from the persistent tier", key);
                        return Some(value);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("persistent read for '{}' failed: {}", key, err);
                }
            }
        }

        None
    }

    // == Set ==
    /// Stores a value under the resolved strategy.
    ///
    /// Resolution order: explicit options, then the first matching strategy,
    /// then engine defaults. If the strategy's condition rejects the
    /// key/value pair, the call is a no-op. Failures anywhere below the
    /// memory tier are logged, never surfaced.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, opts: SetOptions) {
        if key.len() > MAX_KEY_LENGTH {
            warn!("key exceeds maximum length of {} bytes, skipping", MAX_KEY_LENGTH);
            return;
        }
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(err) => {
                warn!("value for '{}' failed to serialize, skipping: {}", key, err);
                return;
            }
        };
        let Some(plan) = self.resolve_plan(key, &json, &opts).await else {
            debug!("strategy condition rejected '{}', skipping", key);
            return;
        };
        let raw = match serde_json::to_vec(&json) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("value for '{}' failed to serialize, skipping: {}", key, err);
                return;
            }
        };
        let (payload, compressed) = if plan.compress {
            compress::maybe_compress(&raw)
        } else {
            (raw, false)
        };
        if payload.len() > self.config.max_bytes {
            warn!(
                "value for '{}' ({} bytes) exceeds the cache byte limit, skipping",
                key,
                payload.len()
            );
            return;
        }

        let entry = CacheEntry::new(payload, compressed, Some(plan.ttl_seconds), plan.tags)
            .with_metadata(opts.metadata)
            .with_dependencies(plan.depends_on);
        let stored = StoredEntry::from_entry(key, &entry);

        let evicted = { self.store.write().await.insert(key.to_string(), entry) };
        for victim in evicted {
            self.emit(CacheEvent::Evicted { key: victim });
        }
        self.emit(CacheEvent::Set {
            key: key.to_string(),
        });

        self.invalidate_dependents(key).await;
        self.write_through(key, &stored).await;
    }

    // == Delete ==
    /// Removes a key from every tier, best-effort below the memory tier.
    pub async fn delete(&self, key: &str) {
        let removed = { self.store.write().await.remove(key) };
        if removed {
            self.emit(CacheEvent::Deleted {
                key: key.to_string(),
            });
        }
        self.invalidate_dependents(key).await;
        self.propagate_delete(key).await;
    }

    // == Exists ==
    /// Returns whether a live value exists for the key, checking the memory
    /// tier first and falling back to the secondary tiers best-effort.
    pub async fn exists(&self, key: &str) -> bool {
        if self.store.read().await.contains(key) {
            return true;
        }
        if let Some(remote) = &self.remote {
            match remote.exists(key).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => {
                    debug!("remote exists for '{}' failed: {}", key, err);
                }
            }
        }
        if let Some(tier) = &self.persistent {
            match tier.load(key).await {
                Ok(Some(stored)) => return !stored.is_expired(),
                Ok(None) => {}
                Err(err) => {
                    debug!("persistent exists for '{}' failed: {}", key, err);
                }
            }
        }
        false
    }

    // == Delete By Tag ==
    /// Removes every entry carrying `tag` from the memory and persistent
    /// tiers, then deletes the affected keys remotely.
    ///
    /// Administrative operation: tier failures propagate so the caller gets
    /// a definite outcome. Safe to retry. Returns the number of distinct
    /// keys removed.
    pub async fn delete_by_tag(&self, tag: &str) -> Result<usize> {
        let local_removed = { self.store.write().await.remove_by_tag(tag) };
        let mut all: HashSet<String> = local_removed.into_iter().collect();

        if let Some(tier) = &self.persistent {
            for key in tier.remove_by_tag(tag).await? {
                all.insert(key);
            }
        }
        if let Some(remote) = &self.remote {
            for key in &all {
                remote.delete(key).await?;
            }
        }

        self.emit(CacheEvent::TagInvalidated {
            tag: tag.to_string(),
            removed: all.len(),
        });
        Ok(all.len())
    }

    // == Clear ==
    /// Removes every entry from every tier.
    ///
    /// Administrative operation: tier failures propagate.
    pub async fn clear(&self) -> Result<()> {
        {
            self.store.write().await.clear();
        }
        if let Some(remote) = &self.remote {
            remote.clear().await?;
        }
        if let Some(tier) = &self.persistent {
            tier.clear().await?;
        }
        self.emit(CacheEvent::Cleared);
        Ok(())
    }

    // == Get Or Set ==
    /// Returns the cached value, or runs the factory and caches its result.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, factory: F, opts: SetOptions) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(value) = self.get::<T>(key).await {
            return value;
        }
        let value = factory().await;
        self.set(key, &value, opts).await;
        value
    }

    // == Multi-Key Operations ==
    /// Retrieves several keys, preserving order; misses yield `None`.
    pub async fn mget<T: DeserializeOwned>(&self, keys: &[&str]) -> Vec<Option<T>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.get(key).await);
        }
        results
    }

    /// Stores several entries, each with its own options.
    pub async fn mset<T: Serialize>(&self, entries: Vec<(String, T, SetOptions)>) {
        for (key, value, opts) in entries {
            self.set(&key, &value, opts).await;
        }
    }

    // == Counters ==
    /// Adds `amount` to the numeric value under `key` and stores the result.
    ///
    /// A missing or non-numeric current value reads as 0. The
    /// read-modify-write runs under a single store lock, so concurrent
    /// increments through the same engine never lose updates.
    pub async fn incr(&self, key: &str, amount: i64) -> i64 {
        let mut store = self.store.write().await;
        let current = store
            .peek(key)
            .and_then(|entry| decode_value::<Value>(&entry.payload, entry.compressed).ok())
            .and_then(|value| value.as_i64())
            .unwrap_or(0);
        let new_value = current + amount;

        let json = Value::from(new_value);
        let Some(plan) = self.resolve_plan(key, &json, &SetOptions::default()).await else {
            return new_value;
        };
        let raw = match serde_json::to_vec(&json) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("counter '{}' failed to serialize, skipping: {}", key, err);
                return new_value;
            }
        };
        let entry = CacheEntry::new(raw, false, Some(plan.ttl_seconds), plan.tags)
            .with_dependencies(plan.depends_on);
        let stored = StoredEntry::from_entry(key, &entry);
        let evicted = store.insert(key.to_string(), entry);
        drop(store);

        for victim in evicted {
            self.emit(CacheEvent::Evicted { key: victim });
        }
        self.emit(CacheEvent::Set {
            key: key.to_string(),
        });
        self.invalidate_dependents(key).await;
        self.write_through(key, &stored).await;

        new_value
    }

    /// Subtracts `amount` from the numeric value under `key`.
    pub async fn decr(&self, key: &str, amount: i64) -> i64 {
        self.incr(key, -amount).await
    }

    // == Strategy Registration ==
    /// Associates a key pattern with a caching strategy.
    pub async fn register_strategy(&self, pattern: impl Into<String>, strategy: CacheStrategy) {
        self.registry.write().await.register(pattern, strategy);
    }

    // == Statistics ==
    /// Returns current statistics, including offline queue counters.
    pub async fn statistics(&self) -> CacheStatistics {
        let mut stats = self.store.read().await.statistics();
        stats.offline_queue_depth = self.queue.len().await;
        stats.offline_queue_dropped = self.queue.dropped_count();
        stats
    }

    /// Returns the `n` most-accessed keys with their access counts.
    pub async fn top_keys(&self, n: usize) -> Vec<(String, u64)> {
        self.store.read().await.top_keys(n)
    }

    // == Rehydrate ==
    /// Loads the persistent tier into the memory tier at startup.
    ///
    /// Expired entries are pruned from disk; live entries fill the store up
    /// to its limits. Returns the number of entries restored.
    pub async fn rehydrate(&self) -> Result<usize> {
        let Some(tier) = &self.persistent else {
            return Ok(0);
        };

        let entries = tier.load_all().await?;
        let mut expired = Vec::new();
        let mut restored = 0;
        {
            let mut store = self.store.write().await;
            for stored in entries {
                if stored.is_expired() {
                    expired.push(stored.key);
                    continue;
                }
                let key = stored.key.clone();
                match stored.into_entry() {
                    Ok(entry) => {
                        if store.rehydrate(key, entry) {
                            restored += 1;
                        }
                    }
                    Err(err) => {
                        warn!("skipping corrupt persisted entry '{}': {}", key, err);
                    }
                }
            }
        }
        for key in &expired {
            if let Err(err) = tier.remove(key).await {
                warn!("failed to prune expired persisted entry '{}': {}", key, err);
            }
        }

        info!("rehydrated {} entries from the persistent tier", restored);
        Ok(restored)
    }

    // == Background Tasks ==
    /// Spawns the expiry sweep and, when a remote tier is attached, the
    /// offline queue replay loop.
    pub fn start_background_tasks(&self) -> EngineTasks {
        let sweep = spawn_sweep_task(
            Arc::clone(&self.store),
            self.persistent.clone(),
            self.config.sweep_interval,
            self.config.sweep_batch_size,
            self.config.target_utilization,
            Arc::clone(&self.observers),
        );
        let replay = self.remote.as_ref().map(|remote| {
            spawn_replay_task(
                Arc::clone(&self.queue),
                Arc::clone(remote),
                self.config.replay_interval,
                Arc::clone(&self.observers),
            )
        });
        EngineTasks { sweep, replay }
    }

    // == Internals ==
    /// Folds explicit options over the matching strategy and engine
    /// defaults. Returns None when the strategy's condition rejects the
    /// key/value pair.
    async fn resolve_plan(&self, key: &str, value: &Value, opts: &SetOptions) -> Option<WritePlan> {
        let registry = self.registry.read().await;
        let strategy = match &opts.strategy {
            Some(pattern) => registry.get(pattern),
            None => registry.resolve(key),
        };

        if let Some(strategy) = strategy {
            if !strategy.allows(key, value) {
                return None;
            }
        }

        let strategy_ttl = strategy.and_then(|s| s.resolve_ttl(value));
        let ttl_seconds = opts
            .ttl
            .or(strategy_ttl)
            .unwrap_or(self.config.default_ttl);

        let mut tags: HashSet<String> = opts.tags.iter().cloned().collect();
        if let Some(strategy) = strategy {
            tags.extend(strategy.tags.iter().cloned());
        }

        let compress = opts
            .compress
            .unwrap_or_else(|| strategy.map(|s| s.compress).unwrap_or(false));
        let depends_on: HashSet<String> = strategy
            .map(|s| s.dependencies.iter().cloned().collect())
            .unwrap_or_default();

        Some(WritePlan {
            ttl_seconds,
            tags,
            compress,
            depends_on,
        })
    }

    /// Decodes a remote envelope and populates the memory tier.
    async fn adopt_remote<T: DeserializeOwned>(&self, key: &str, bytes: &[u8]) -> Option<T> {
        let stored = match StoredEntry::from_bytes(bytes) {
            Ok(stored) => stored,
            Err(err) => {
                warn!("undecodable remote envelope for '{}': {}", key, err);
                return None;
            }
        };
        if stored.is_expired() {
            return None;
        }
        self.adopt(key, stored).await
    }

    /// Converts a stored envelope into a live entry, populates the memory
    /// tier, and returns the decoded value.
    async fn adopt<T: DeserializeOwned>(&self, key: &str, stored: StoredEntry) -> Option<T> {
        let entry = match stored.into_entry() {
            Ok(entry) => entry,
            Err(err) => {
                warn!("corrupt stored entry for '{}': {}", key, err);
                return None;
            }
        };
        match decode_value::<T>(&entry.payload, entry.compressed) {
            Ok(value) => {
                let evicted = { self.store.write().await.populate(key.to_string(), entry) };
                for victim in evicted {
                    self.emit(CacheEvent::Evicted { key: victim });
                }
                Some(value)
            }
            Err(err) => {
                warn!("stored payload for '{}' failed to decode: {}", key, err);
                None
            }
        }
    }

    /// Writes an entry to the remote and persistent tiers best-effort.
    /// Connectivity failures queue the write for replay.
    async fn write_through(&self, key: &str, stored: &StoredEntry) {
        let bytes = match stored.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("envelope for '{}' failed to serialize: {}", key, err);
                return;
            }
        };

        if let Some(remote) = &self.remote {
            let ttl = stored.ttl_remaining();
            if let Err(err) = remote.set(key, &bytes, ttl).await {
                if err.is_connectivity() {
                    warn!(
                        "remote set for '{}' failed with connectivity loss, queueing: {}",
                        key, err
                    );
                    self.queue
                        .enqueue(QueuedWrite::Set {
                            key: key.to_string(),
                            payload: bytes.clone(),
                            ttl_seconds: ttl,
                        })
                        .await;
                    self.emit(CacheEvent::WriteQueued {
                        key: key.to_string(),
                    });
                } else {
                    warn!("remote set for '{}' failed: {}", key, err);
                }
            }
        }

        if let Some(tier) = &self.persistent {
            if let Err(err) = tier.store(stored).await {
                warn!("persistent write for '{}' failed: {}", key, err);
            }
        }
    }

    /// Deletes a key from the remote and persistent tiers best-effort.
    /// Connectivity failures queue the delete for replay.
    async fn propagate_delete(&self, key: &str) {
        if let Some(remote) = &self.remote {
            if let Err(err) = remote.delete(key).await {
                if err.is_connectivity() {
                    warn!(
                        "remote delete for '{}' failed with connectivity loss, queueing: {}",
                        key, err
                    );
                    self.queue
                        .enqueue(QueuedWrite::Delete {
                            key: key.to_string(),
                        })
                        .await;
                    self.emit(CacheEvent::WriteQueued {
                        key: key.to_string(),
                    });
                } else {
                    warn!("remote delete for '{}' failed: {}", key, err);
                }
            }
        }
        if let Some(tier) = &self.persistent {
            if let Err(err) = tier.remove(key).await {
                warn!("persistent delete for '{}' failed: {}", key, err);
            }
        }
    }

    /// Removes entries that declared a dependency on `key`, single level,
    /// and propagates the removals to the secondary tiers.
    async fn invalidate_dependents(&self, key: &str) {
        let dependents = { self.store.write().await.remove_dependents(key) };
        for dependent in dependents {
            debug!("invalidated '{}' after change to '{}'", dependent, key);
            self.emit(CacheEvent::Deleted {
                key: dependent.clone(),
            });
            self.propagate_delete(&dependent).await;
        }
    }

    /// Delivers an event to every observer in registration order.
    fn emit(&self, event: CacheEvent) {
        for observer in self.observers.iter() {
            observer.on_event(&event);
        }
    }
}

// == Background Task Handles ==
/// Handles for the engine's background loops.
pub struct EngineTasks {
    sweep: tokio::task::JoinHandle<()>,
    replay: Option<tokio::task::JoinHandle<()>>,
}

impl EngineTasks {
    /// Stops the background loops. No entries are processed after this.
    pub fn shutdown(self) {
        self.sweep.abort();
        if let Some(replay) = self.replay {
            replay.abort();
        }
        info!("cache background tasks stopped");
    }
}

// == Payload Decoding ==
/// Decompresses (when flagged) and deserializes a stored payload.
fn decode_value<T: DeserializeOwned>(payload: &[u8], compressed: bool) -> Result<T> {
    if compressed {
        let raw = compress::decompress(payload)?;
        Ok(serde_json::from_slice(&raw)?)
    } else {
        Ok(serde_json::from_slice(payload)?)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EvictionPolicy;
    use serde::Deserialize;

    fn engine() -> CacheEngine {
        CacheEngine::new(CacheConfig::default())
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        name: String,
        score: u32,
    }

    #[tokio::test]
    async fn test_set_and_get_roundtrip() {
        let engine = engine();
        let value = Payload {
            name: "alice".to_string(),
            score: 100,
        };

        engine.set("user:1", &value, SetOptions::new()).await;
        let got: Option<Payload> = engine.get("user:1").await;

        assert_eq!(got, Some(value));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let engine = engine();

        let got: Option<String> = engine.get("nope").await;
        assert!(got.is_none());
        assert_eq!(engine.statistics().await.misses, 1);
    }

    #[tokio::test]
    async fn test_strategy_supplies_ttl_and_tags() {
        let engine = engine();
        engine
            .register_strategy(
                "session:*",
                CacheStrategy::new().with_ttl(1800).with_tags(["session"]),
            )
            .await;

        engine.set("session:abc", &"data", SetOptions::new()).await;

        let store = engine.store.read().await;
        let entry = store.peek("session:abc").unwrap();
        assert!(entry.tags.contains("session"));
        assert_eq!(entry.expires_at.unwrap(), entry.created_at + 1800 * 1000);
    }

    #[tokio::test]
    async fn test_explicit_ttl_beats_strategy() {
        let engine = engine();
        engine
            .register_strategy("session:*", CacheStrategy::new().with_ttl(1800))
            .await;

        engine
            .set("session:abc", &"data", SetOptions::new().with_ttl(60))
            .await;

        let store = engine.store.read().await;
        let entry = store.peek("session:abc").unwrap();
        assert_eq!(entry.expires_at.unwrap(), entry.created_at + 60 * 1000);
    }

    #[tokio::test]
    async fn test_condition_rejection_is_a_noop() {
        let engine = engine();
        engine
            .register_strategy(
                "user:*",
                CacheStrategy::new().with_condition(|_, value| !value.is_null()),
            )
            .await;

        engine.set("user:1", &Value::Null, SetOptions::new()).await;

        assert!(!engine.exists("user:1").await);
        assert_eq!(engine.statistics().await.sets, 0);
    }

    #[tokio::test]
    async fn test_incr_initializes_and_accumulates() {
        let engine = engine();

        assert_eq!(engine.incr("counter", 1).await, 1);
        assert_eq!(engine.incr("counter", 1).await, 2);
        assert_eq!(engine.incr("counter", 1).await, 3);

        let got: Option<i64> = engine.get("counter").await;
        assert_eq!(got, Some(3));
    }

    #[tokio::test]
    async fn test_decr_goes_negative_from_missing() {
        let engine = engine();

        assert_eq!(engine.decr("balance", 5).await, -5);
        assert_eq!(engine.incr("balance", 8).await, 3);
    }

    #[tokio::test]
    async fn test_incr_treats_non_numeric_as_zero() {
        let engine = engine();
        engine.set("counter", &"not a number", SetOptions::new()).await;

        assert_eq!(engine.incr("counter", 4).await, 4);
    }

    #[tokio::test]
    async fn test_mset_and_mget_preserve_order() {
        let engine = engine();

        engine
            .mset(vec![
                ("a".to_string(), 1u32, SetOptions::new()),
                ("b".to_string(), 2u32, SetOptions::new()),
            ])
            .await;

        let got: Vec<Option<u32>> = engine.mget(&["a", "missing", "b"]).await;
        assert_eq!(got, vec![Some(1), None, Some(2)]);
    }

    #[tokio::test]
    async fn test_get_or_set_runs_factory_once() {
        let engine = engine();

        let first = engine
            .get_or_set("expensive", || async { 42u32 }, SetOptions::new())
            .await;
        let second = engine
            .get_or_set("expensive", || async { 7u32 }, SetOptions::new())
            .await;

        assert_eq!(first, 42);
        assert_eq!(second, 42, "cached value wins over the second factory");
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let engine = engine();
        engine.set("k", &1u32, SetOptions::new()).await;
        assert!(engine.exists("k").await);

        engine.delete("k").await;
        assert!(!engine.exists("k").await);
        assert_eq!(engine.statistics().await.deletes, 1);
    }

    #[tokio::test]
    async fn test_delete_by_tag_local_only() {
        let engine = engine();
        engine
            .set("a", &1u32, SetOptions::new().with_tags(["session"]))
            .await;
        engine.set("b", &2u32, SetOptions::new()).await;

        let removed = engine.delete_by_tag("session").await.unwrap();

        assert_eq!(removed, 1);
        assert!(!engine.exists("a").await);
        assert!(engine.exists("b").await);
    }

    #[tokio::test]
    async fn test_compressed_strategy_roundtrip() {
        let engine = engine();
        engine
            .register_strategy("blob:*", CacheStrategy::new().with_compression())
            .await;

        let blob = "repetitive ".repeat(500);
        engine.set("blob:1", &blob, SetOptions::new()).await;

        {
            let store = engine.store.read().await;
            let entry = store.peek("blob:1").unwrap();
            assert!(entry.compressed);
            assert!(entry.size_bytes < blob.len());
        }

        let got: Option<String> = engine.get("blob:1").await;
        assert_eq!(got, Some(blob));
    }

    #[tokio::test]
    async fn test_dependency_invalidation_on_set() {
        let engine = engine();
        engine
            .register_strategy(
                "render:*",
                CacheStrategy::new().with_dependencies(["model:1"]),
            )
            .await;

        engine.set("render:1", &"frame", SetOptions::new()).await;
        engine.set("model:1", &"geometry", SetOptions::new()).await;

        assert!(!engine.exists("render:1").await, "dependent invalidated");
        assert!(engine.exists("model:1").await);
    }

    #[tokio::test]
    async fn test_oversized_value_is_skipped() {
        let mut config = CacheConfig::default();
        config.max_bytes = 16;
        config.eviction_policy = EvictionPolicy::Lru;
        let engine = CacheEngine::new(config);

        engine
            .set("big", &"x".repeat(64), SetOptions::new())
            .await;

        assert!(!engine.exists("big").await);
    }

    #[tokio::test]
    async fn test_overlong_key_is_skipped() {
        let engine = engine();
        let key = "k".repeat(MAX_KEY_LENGTH + 1);

        engine.set(&key, &1u32, SetOptions::new()).await;

        assert!(!engine.exists(&key).await);
    }

    #[tokio::test]
    async fn test_statistics_hit_rate() {
        let engine = engine();
        engine.set("k", &1u32, SetOptions::new()).await;

        for _ in 0..7 {
            let _: Option<u32> = engine.get("k").await;
        }
        for _ in 0..3 {
            let _: Option<u32> = engine.get("missing").await;
        }

        let stats = engine.statistics().await;
        assert_eq!(stats.hits, 7);
        assert_eq!(stats.misses, 3);
        assert!((stats.hit_rate() - 0.7).abs() < f64::EPSILON);
    }
}
