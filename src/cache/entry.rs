//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support,
//! access bookkeeping, tags, and dependency tracking.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// Represents a single cache entry and its metadata.
///
/// The payload is an opaque serialized value: the store never interprets it.
/// An entry is logically expired once `now >= expires_at`, independent of
/// whether it has been physically removed yet.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored payload (serialized value, possibly compressed)
    pub payload: Vec<u8>,
    /// Whether the payload is LZ4-compressed
    pub compressed: bool,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Last access timestamp (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Number of times the entry was read
    pub access_count: u64,
    /// Tags for bulk invalidation
    pub tags: HashSet<String>,
    /// Stored payload length in bytes
    pub size_bytes: usize,
    /// Free-form caller metadata
    pub metadata: HashMap<String, serde_json::Value>,
    /// Keys whose change invalidates this entry
    pub depends_on: HashSet<String>,
    /// Insertion counter, assigned by the store for deterministic
    /// eviction tie-breaking
    pub sequence: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with an optional TTL.
    ///
    /// # Arguments
    /// * `payload` - The serialized value to store
    /// * `compressed` - Whether `payload` is LZ4-compressed
    /// * `ttl_seconds` - Optional TTL in seconds
    /// * `tags` - Tags for bulk invalidation
    pub fn new(
        payload: Vec<u8>,
        compressed: bool,
        ttl_seconds: Option<u64>,
        tags: HashSet<String>,
    ) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl_seconds.map(|ttl| now + ttl * 1000);
        let size_bytes = payload.len();

        Self {
            payload,
            compressed,
            created_at: now,
            expires_at,
            last_accessed_at: now,
            access_count: 0,
            tags,
            size_bytes,
            metadata: HashMap::new(),
            depends_on: HashSet::new(),
            sequence: 0,
        }
    }

    /// Attaches free-form metadata to the entry.
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Records the keys whose change invalidates this entry.
    pub fn with_dependencies(mut self, depends_on: HashSet<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is considered expired when the current
    /// time is greater than or equal to the expiration time.
    ///
    /// # Returns
    /// - `true` if the entry has a TTL and the current time >= expiration time
    /// - `false` if the entry has no TTL (never expires) or TTL hasn't elapsed
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    // == Touch ==
    /// Records a read access: bumps `access_count` and `last_accessed_at`.
    pub fn touch(&mut self) {
        self.last_accessed_at = current_timestamp_ms();
        self.access_count += 1;
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired (TTL elapsed)
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry has no TTL (never expires)
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let now = current_timestamp_ms();
            expires.saturating_sub(now)
        })
    }

    /// Returns remaining TTL in seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.ttl_remaining_ms().map(|ms| ms / 1000)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
