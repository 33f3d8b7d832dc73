//! Eviction Policy Module
//!
//! Pure victim-selection strategies for the cache store. A policy orders the
//! current entries and accumulates victims until the caller's space and item
//! requirements are met. Ties within a policy's ordering are broken by
//! insertion order so eviction is deterministic in tests.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cache::CacheEntry;

// == Eviction Policy ==
/// Victim-selection strategy used when the store exceeds its limits.
#[derive(Debug, Clone)]
pub enum EvictionPolicy {
    /// Least recently used: ascending `last_accessed_at`
    Lru,
    /// Least frequently used: ascending `access_count`
    Lfu,
    /// First in, first out: ascending `created_at`
    Fifo,
    /// Uniformly shuffled order (XorShift64 state, seedable for tests)
    Random { state: u64 },
}

impl EvictionPolicy {
    // == Constructors ==
    /// Creates a Random policy seeded from the system clock.
    pub fn random() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self::random_with_seed(seed)
    }

    /// Creates a Random policy with a fixed seed for deterministic tests.
    pub fn random_with_seed(seed: u64) -> Self {
        // XorShift64 cycles on zero state
        EvictionPolicy::Random { state: seed | 1 }
    }

    // == Select Victims ==
    /// Selects entries to evict until at least `need_bytes` payload bytes
    /// and `need_items` slots would be freed.
    ///
    /// Returns the victim keys in eviction order. The caller removes them
    /// from the store and records the evictions.
    pub fn select_victims(
        &mut self,
        entries: &HashMap<String, CacheEntry>,
        need_bytes: usize,
        need_items: usize,
    ) -> Vec<String> {
        if need_bytes == 0 && need_items == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<(&String, &CacheEntry)> = entries.iter().collect();

        match self {
            EvictionPolicy::Lru => {
                candidates.sort_by_key(|(_, e)| (e.last_accessed_at, e.sequence));
            }
            EvictionPolicy::Lfu => {
                candidates.sort_by_key(|(_, e)| (e.access_count, e.sequence));
            }
            EvictionPolicy::Fifo => {
                candidates.sort_by_key(|(_, e)| (e.created_at, e.sequence));
            }
            EvictionPolicy::Random { state } => {
                // Stable starting order so a fixed seed shuffles reproducibly
                candidates.sort_by_key(|(_, e)| e.sequence);
                shuffle(&mut candidates, state);
            }
        }

        let mut victims = Vec::new();
        let mut freed_bytes = 0usize;
        let mut freed_items = 0usize;

        for (key, entry) in candidates {
            if freed_bytes >= need_bytes && freed_items >= need_items {
                break;
            }
            freed_bytes += entry.size_bytes;
            freed_items += 1;
            victims.push(key.clone());
        }

        victims
    }
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::Lru
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "fifo" => Ok(EvictionPolicy::Fifo),
            "random" => Ok(EvictionPolicy::random()),
            other => Err(format!("unknown eviction policy: {}", other)),
        }
    }
}

// == Shuffle ==
/// Fisher-Yates shuffle driven by an XorShift64 PRNG.
///
/// XorShift is fast, dependency-free, and seedable, which keeps random
/// eviction reproducible in tests.
fn shuffle<T>(items: &mut [T], state: &mut u64) {
    for i in (1..items.len()).rev() {
        let mut x = *state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        *state = x;
        let j = (x as usize) % (i + 1);
        items.swap(i, j);
    }
}
