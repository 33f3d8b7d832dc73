//! Cache Store Module
//!
//! The primary in-memory tier: a HashMap of entries plus the eviction
//! policy, statistics counters, and running size totals. The store is a
//! synchronous core; the engine wraps it in `Arc<RwLock<..>>` for
//! concurrent access and layers the remote and persistent tiers on top.

use std::collections::HashMap;

use crate::cache::{CacheEntry, CacheStatistics, EvictionPolicy};

// == Cache Store ==
/// In-memory key-value store with TTL expiration and pluggable eviction.
///
/// Item and byte totals are maintained incrementally on insert, delete, and
/// evict, so limit checks never rescan the whole map.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Victim-selection strategy
    policy: EvictionPolicy,
    /// Performance statistics
    stats: CacheStatistics,
    /// Maximum number of entries allowed
    max_items: usize,
    /// Maximum total payload bytes allowed
    max_bytes: usize,
    /// Running total of stored payload bytes
    total_bytes: usize,
    /// Monotonic insertion counter for eviction tie-breaking
    sequence: u64,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore with the given limits and eviction policy.
    ///
    /// # Arguments
    /// * `max_items` - Maximum number of entries the store can hold
    /// * `max_bytes` - Maximum total payload bytes the store can hold
    /// * `policy` - Eviction policy applied when a limit is exceeded
    pub fn new(max_items: usize, max_bytes: usize, policy: EvictionPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
            stats: CacheStatistics::new(),
            max_items,
            max_bytes,
            total_bytes: 0,
            sequence: 0,
        }
    }

    // == Get ==
    /// Retrieves an entry by key with access bookkeeping.
    ///
    /// A present, unexpired entry is touched (`last_accessed_at`,
    /// `access_count`), counted as a hit, and returned. An expired entry is
    /// removed lazily and counted as a miss, as is an absent key.
    pub fn get(&mut self, key: &str) -> Option<CacheEntry> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.drop_entry(key);
            self.stats.record_expiration();
            self.stats.record_miss();
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.touch();
        self.stats.record_hit();
        Some(entry.clone())
    }

    // == Peek ==
    /// Returns the entry without bookkeeping, treating expired entries as
    /// absent. Does not record a hit or a miss.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key).filter(|e| !e.is_expired())
    }

    /// Returns true if a valid (unexpired) entry exists for the key.
    pub fn contains(&self, key: &str) -> bool {
        self.peek(key).is_some()
    }

    // == Insert ==
    /// Stores an entry, evicting via the policy first when the insert would
    /// exceed a limit. Overwriting a key frees the old entry before the
    /// limit check. Returns the evicted keys.
    pub fn insert(&mut self, key: String, entry: CacheEntry) -> Vec<String> {
        let evicted = self.make_room(&key, entry.size_bytes);
        self.stats.record_set();
        self.insert_unchecked(key, entry);
        evicted
    }

    // == Populate ==
    /// Stores an entry recovered from a secondary tier (read-through fill).
    ///
    /// Identical to [`insert`](Self::insert) except the `sets` counter is
    /// not incremented: the entry was not produced by a caller write.
    pub fn populate(&mut self, key: String, entry: CacheEntry) -> Vec<String> {
        let evicted = self.make_room(&key, entry.size_bytes);
        self.insert_unchecked(key, entry);
        evicted
    }

    // == Rehydrate ==
    /// Restores an entry at startup without statistics or eviction churn.
    ///
    /// Expired entries, keys already present, and entries that would exceed
    /// a limit are skipped. Returns whether the entry was stored.
    pub fn rehydrate(&mut self, key: String, entry: CacheEntry) -> bool {
        if entry.is_expired() || self.entries.contains_key(&key) {
            return false;
        }
        if self.entries.len() + 1 > self.max_items
            || self.total_bytes + entry.size_bytes > self.max_bytes
        {
            return false;
        }
        self.insert_unchecked(key, entry);
        true
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether an entry was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        if self.drop_entry(key).is_some() {
            self.stats.record_delete();
            true
        } else {
            false
        }
    }

    // == Delete By Tag ==
    /// Removes every entry whose tag set contains `tag`.
    ///
    /// This is a full scan over current entries: the one consciously
    /// accepted linear operation. Returns the removed keys.
    pub fn remove_by_tag(&mut self, tag: &str) -> Vec<String> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.tags.contains(tag))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            if self.drop_entry(key).is_some() {
                self.stats.record_delete();
            }
        }

        keys
    }

    // == Dependency Invalidation ==
    /// Removes every entry that declared a dependency on `changed_key`.
    ///
    /// Single level: removed dependents do not trigger further cascades.
    /// Returns the removed keys.
    pub fn remove_dependents(&mut self, changed_key: &str) -> Vec<String> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, entry)| {
                key.as_str() != changed_key && entry.depends_on.contains(changed_key)
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            if self.drop_entry(key).is_some() {
                self.stats.record_delete();
            }
        }

        keys
    }

    // == Clear ==
    /// Removes all entries. Statistics counters are monotonic and survive.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    // == Expired Keys ==
    /// Snapshots the keys of logically expired entries.
    ///
    /// Taken under a read lock by the sweep so the exclusive lock is only
    /// held for the small removal batches that follow.
    pub fn expired_keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Remove Expired Batch ==
    /// Removes a batch of keys captured by [`expired_keys`](Self::expired_keys),
    /// rechecking expiry first: a key re-set since the snapshot is left
    /// alone. Returns the keys actually removed.
    pub fn remove_expired_batch(&mut self, keys: &[String]) -> Vec<String> {
        let mut removed = Vec::new();
        for key in keys {
            let still_expired = self
                .entries
                .get(key)
                .map(|entry| entry.is_expired())
                .unwrap_or(false);
            if still_expired && self.drop_entry(key).is_some() {
                self.stats.record_expiration();
                removed.push(key.clone());
            }
        }
        removed
    }

    // == Enforce Target ==
    /// Evicts down to `target_utilization` of both limits, but only when a
    /// limit is currently exceeded. Returns the evicted keys.
    pub fn enforce_target(&mut self, target_utilization: f64) -> Vec<String> {
        if self.entries.len() <= self.max_items && self.total_bytes <= self.max_bytes {
            return Vec::new();
        }

        let ratio = target_utilization.clamp(0.0, 1.0);
        let target_items = (self.max_items as f64 * ratio) as usize;
        let target_bytes = (self.max_bytes as f64 * ratio) as usize;
        let need_items = self.entries.len().saturating_sub(target_items);
        let need_bytes = self.total_bytes.saturating_sub(target_bytes);

        let victims = self
            .policy
            .select_victims(&self.entries, need_bytes, need_items);

        let mut evicted = Vec::with_capacity(victims.len());
        for victim in victims {
            if self.drop_entry(&victim).is_some() {
                self.stats.record_eviction();
                evicted.push(victim);
            }
        }
        evicted
    }

    // == Top Keys ==
    /// Returns the `n` most-accessed keys with their access counts,
    /// descending. Ties are broken by key for stable output.
    pub fn top_keys(&self, n: usize) -> Vec<(String, u64)> {
        let mut items: Vec<(String, u64)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.access_count))
            .collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        items.truncate(n);
        items
    }

    // == Stats ==
    /// Returns current statistics with up-to-date totals.
    pub fn statistics(&self) -> CacheStatistics {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.total_bytes = self.total_bytes;
        stats
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the running total of stored payload bytes.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    // == Internals ==
    /// Removes an entry and keeps the byte total in sync. No statistics.
    fn drop_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_bytes -= entry.size_bytes;
        Some(entry)
    }

    /// Frees enough space for an incoming entry, counting each eviction.
    fn make_room(&mut self, key: &str, incoming_bytes: usize) -> Vec<String> {
        // Overwrite frees the old entry before the limit check
        self.drop_entry(key);

        let need_items = (self.entries.len() + 1).saturating_sub(self.max_items);
        let need_bytes = (self.total_bytes + incoming_bytes).saturating_sub(self.max_bytes);
        if need_items == 0 && need_bytes == 0 {
            return Vec::new();
        }

        let victims = self
            .policy
            .select_victims(&self.entries, need_bytes, need_items);

        let mut evicted = Vec::with_capacity(victims.len());
        for victim in victims {
            if self.drop_entry(&victim).is_some() {
                self.stats.record_eviction();
                evicted.push(victim);
            }
        }
        evicted
    }

    /// Assigns the insertion sequence and stores the entry.
    fn insert_unchecked(&mut self, key: String, mut entry: CacheEntry) {
        entry.sequence = self.sequence;
        self.sequence += 1;
        self.total_bytes += entry.size_bytes;
        self.entries.insert(key, entry);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::current_timestamp_ms;
    use std::collections::HashSet;

    fn store() -> CacheStore {
        CacheStore::new(100, 1024 * 1024, EvictionPolicy::Lru)
    }

    fn entry(payload: &[u8]) -> CacheEntry {
        CacheEntry::new(payload.to_vec(), false, Some(300), HashSet::new())
    }

    fn tagged_entry(payload: &[u8], tags: &[&str]) -> CacheEntry {
        let tags = tags.iter().map(|t| t.to_string()).collect();
        CacheEntry::new(payload.to_vec(), false, Some(300), tags)
    }

    #[test]
    fn test_store_new() {
        let store = store();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.total_bytes(), 0);
    }

    #[test]
    fn test_store_insert_and_get() {
        let mut store = store();

        store.insert("key1".to_string(), entry(b"value1"));
        let got = store.get("key1").unwrap();

        assert_eq!(got.payload, b"value1");
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_bytes(), 6);
    }

    #[test]
    fn test_store_get_nonexistent_records_miss() {
        let mut store = store();

        assert!(store.get("nonexistent").is_none());
        assert_eq!(store.statistics().misses, 1);
    }

    #[test]
    fn test_store_get_bumps_access_bookkeeping() {
        let mut store = store();
        store.insert("key1".to_string(), entry(b"v"));

        store.get("key1");
        let got = store.get("key1").unwrap();

        assert_eq!(got.access_count, 2);
        assert_eq!(store.statistics().hits, 2);
    }

    #[test]
    fn test_store_overwrite_replaces_value_and_bytes() {
        let mut store = store();

        store.insert("key1".to_string(), entry(b"short"));
        store.insert("key1".to_string(), entry(b"a longer value"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.total_bytes(), 14);
        assert_eq!(store.get("key1").unwrap().payload, b"a longer value");
    }

    #[test]
    fn test_store_lazy_expiry_on_get() {
        let mut store = store();
        store.insert("key1".to_string(), entry(b"v"));

        // Force logical expiry without waiting
        store.entries.get_mut("key1").unwrap().expires_at =
            Some(current_timestamp_ms().saturating_sub(1000));

        assert!(store.get("key1").is_none());
        assert_eq!(store.len(), 0, "expired entry removed lazily");

        let stats = store.statistics();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.total_bytes, 0);
    }

    #[test]
    fn test_store_lru_eviction_scenario() {
        // maxItems = 2, LRU: insert a, b; access a; insert c => b evicted
        let mut store = CacheStore::new(2, 1024 * 1024, EvictionPolicy::Lru);

        store.insert("a".to_string(), entry(b"1"));
        store.insert("b".to_string(), entry(b"2"));
        store.get("a");
        store.insert("c".to_string(), entry(b"3"));

        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
        assert_eq!(store.statistics().evictions, 1);
    }

    #[test]
    fn test_store_byte_limit_eviction() {
        let mut store = CacheStore::new(100, 10, EvictionPolicy::Fifo);

        store.insert("a".to_string(), entry(b"aaaa"));
        store.insert("b".to_string(), entry(b"bbbb"));
        // 4 + 4 + 4 > 10: the oldest insertion goes
        store.insert("c".to_string(), entry(b"cccc"));

        assert!(store.peek("a").is_none());
        assert!(store.peek("b").is_some());
        assert!(store.peek("c").is_some());
        assert!(store.total_bytes() <= 10);
    }

    #[test]
    fn test_store_delete() {
        let mut store = store();
        store.insert("key1".to_string(), entry(b"v"));

        assert!(store.remove("key1"));
        assert!(store.is_empty());
        assert_eq!(store.total_bytes(), 0);
        assert_eq!(store.statistics().deletes, 1);

        assert!(!store.remove("key1"));
    }

    #[test]
    fn test_store_remove_by_tag_removes_all_and_only_tagged() {
        let mut store = store();
        store.insert("a".to_string(), tagged_entry(b"1", &["session"]));
        store.insert("b".to_string(), tagged_entry(b"2", &["user"]));
        store.insert("c".to_string(), tagged_entry(b"3", &["session", "user"]));

        let mut removed = store.remove_by_tag("session");
        removed.sort();

        assert_eq!(removed, vec!["a".to_string(), "c".to_string()]);
        assert!(store.peek("a").is_none());
        assert!(store.peek("b").is_some());
        assert!(store.peek("c").is_none());
    }

    #[test]
    fn test_store_remove_dependents_single_level() {
        let mut store = store();
        store.insert("model:1".to_string(), entry(b"m"));
        store.insert(
            "render:1".to_string(),
            entry(b"r").with_dependencies(["model:1".to_string()].into_iter().collect()),
        );
        store.insert(
            "thumb:1".to_string(),
            entry(b"t").with_dependencies(["render:1".to_string()].into_iter().collect()),
        );

        let removed = store.remove_dependents("model:1");

        assert_eq!(removed, vec!["render:1".to_string()]);
        assert!(store.peek("model:1").is_some());
        assert!(store.peek("render:1").is_none());
        // No cascade: thumb:1 depended on render:1, not model:1
        assert!(store.peek("thumb:1").is_some());
    }

    #[test]
    fn test_store_clear_keeps_counters() {
        let mut store = store();
        store.insert("a".to_string(), entry(b"1"));
        store.get("a");

        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.total_bytes(), 0);
        let stats = store.statistics();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.sets, 1);
    }

    #[test]
    fn test_store_expired_keys_and_batch_removal() {
        let mut store = store();
        store.insert("live".to_string(), entry(b"1"));
        store.insert("dead1".to_string(), entry(b"2"));
        store.insert("dead2".to_string(), entry(b"3"));

        let past = current_timestamp_ms().saturating_sub(1000);
        store.entries.get_mut("dead1").unwrap().expires_at = Some(past);
        store.entries.get_mut("dead2").unwrap().expires_at = Some(past);

        let mut expired = store.expired_keys();
        expired.sort();
        assert_eq!(expired, vec!["dead1".to_string(), "dead2".to_string()]);

        // A key re-set after the snapshot must survive the batch removal
        store.insert("dead1".to_string(), entry(b"fresh"));

        let removed = store.remove_expired_batch(&expired);
        assert_eq!(removed, vec!["dead2".to_string()]);
        assert!(store.peek("dead1").is_some());
        assert!(store.peek("dead2").is_none());
        assert_eq!(store.statistics().expirations, 1);
    }

    #[test]
    fn test_store_enforce_target_noop_within_limits() {
        let mut store = store();
        store.insert("a".to_string(), entry(b"1"));

        assert!(store.enforce_target(0.8).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_enforce_target_evicts_down_to_ratio() {
        let mut store = CacheStore::new(10, 1024 * 1024, EvictionPolicy::Fifo);
        for i in 0..10 {
            store.insert(format!("k{}", i), entry(b"x"));
        }
        // Push past the item limit without triggering insert-time eviction
        store.max_items = 8;

        let evicted = store.enforce_target(0.5);

        // 10 entries, target 4 => 6 oldest evicted
        assert_eq!(evicted.len(), 6);
        assert_eq!(store.len(), 4);
        assert!(store.peek("k0").is_none());
        assert!(store.peek("k9").is_some());
    }

    #[test]
    fn test_store_top_keys_orders_by_access_count() {
        let mut store = store();
        store.insert("a".to_string(), entry(b"1"));
        store.insert("b".to_string(), entry(b"2"));
        store.insert("c".to_string(), entry(b"3"));

        store.get("b");
        store.get("b");
        store.get("c");

        let top = store.top_keys(2);
        assert_eq!(top, vec![("b".to_string(), 2), ("c".to_string(), 1)]);
    }

    #[test]
    fn test_store_populate_does_not_count_set() {
        let mut store = store();

        store.populate("a".to_string(), entry(b"1"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.statistics().sets, 0);
    }

    #[test]
    fn test_store_rehydrate_skips_expired_and_full() {
        let mut store = CacheStore::new(1, 1024, EvictionPolicy::Lru);

        let mut dead = entry(b"x");
        dead.expires_at = Some(current_timestamp_ms().saturating_sub(1000));
        assert!(!store.rehydrate("dead".to_string(), dead));

        assert!(store.rehydrate("a".to_string(), entry(b"1")));
        // Store is at capacity: rehydrate never evicts
        assert!(!store.rehydrate("b".to_string(), entry(b"2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_running_byte_total_stays_accurate() {
        let mut store = store();
        store.insert("a".to_string(), entry(b"1234"));
        store.insert("b".to_string(), entry(b"12345678"));
        assert_eq!(store.total_bytes(), 12);

        store.insert("a".to_string(), entry(b"12"));
        assert_eq!(store.total_bytes(), 10);

        store.remove("b");
        assert_eq!(store.total_bytes(), 2);

        store.clear();
        assert_eq!(store.total_bytes(), 0);
    }
}
