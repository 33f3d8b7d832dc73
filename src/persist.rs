//! Persistent Tier Module
//!
//! Durable local storage that survives process restart. Entries are written
//! one file per key under a configured directory, named by the SHA-256 of
//! the key so arbitrary key bytes map to safe, stable filenames. File
//! contents are the JSON [`StoredEntry`] envelope, which doubles as the
//! remote tier's wire format.
//!
//! The tier is used to rehydrate the memory tier after a restart and as a
//! fallback read source when both the memory tier and the remote adapter
//! miss. Writes are best-effort from the engine's point of view.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::warn;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::CacheEntry;
use crate::error::Result;

// == Stored Entry ==
/// Serialized form of a cache entry, used both as the persistent tier's
/// on-disk schema and as the remote tier's value envelope.
///
/// Keeps `key`, expiry, `tags`, and `size_bytes` so rehydration and
/// tag-based invalidation work correctly after a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    /// The cache key (filenames are hashes, so the key lives here)
    pub key: String,
    /// Base64-encoded payload bytes
    pub payload: String,
    /// Whether the payload bytes are LZ4-compressed
    pub compressed: bool,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Tags for bulk invalidation
    pub tags: Vec<String>,
    /// Stored payload length in bytes
    pub size_bytes: usize,
    /// Free-form caller metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Keys whose change invalidates this entry
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl StoredEntry {
    // == From Entry ==
    /// Builds the envelope for a live cache entry.
    pub fn from_entry(key: &str, entry: &CacheEntry) -> Self {
        Self {
            key: key.to_string(),
            payload: BASE64.encode(&entry.payload),
            compressed: entry.compressed,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            tags: entry.tags.iter().cloned().collect(),
            size_bytes: entry.size_bytes,
            metadata: entry.metadata.clone(),
            depends_on: entry.depends_on.iter().cloned().collect(),
        }
    }

    // == Into Entry ==
    /// Reconstructs a cache entry, resetting access bookkeeping.
    pub fn into_entry(self) -> Result<CacheEntry> {
        let payload = BASE64.decode(self.payload.as_bytes())?;
        let size_bytes = payload.len();
        Ok(CacheEntry {
            payload,
            compressed: self.compressed,
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_accessed_at: current_timestamp_ms(),
            access_count: 0,
            tags: self.tags.into_iter().collect(),
            size_bytes,
            metadata: self.metadata,
            depends_on: self.depends_on.into_iter().collect(),
            sequence: 0,
        })
    }

    // == Is Expired ==
    /// Checks logical expiry without deserializing the payload.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    // == TTL Remaining ==
    /// Remaining TTL in seconds, for forwarding to the remote tier.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()) / 1000)
    }

    // == Wire Codec ==
    /// Serializes the envelope to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserializes an envelope from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// == Persistent Tier ==
/// File-per-key durable store under a single directory.
#[derive(Debug, Clone)]
pub struct PersistentTier {
    dir: PathBuf,
}

impl PersistentTier {
    // == Constructor ==
    /// Creates a tier rooted at `dir`. The directory is created lazily on
    /// the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the tier's root directory.
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    // == Store ==
    /// Writes an entry's envelope to disk.
    pub async fn store(&self, entry: &StoredEntry) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let bytes = entry.to_bytes()?;
        fs::write(self.path_for(&entry.key), bytes).await?;
        Ok(())
    }

    // == Load ==
    /// Reads the envelope stored for `key`, if any.
    pub async fn load(&self, key: &str) -> Result<Option<StoredEntry>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(StoredEntry::from_bytes(&bytes)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    // == Remove ==
    /// Removes the file for `key`. A missing file is not an error.
    pub async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    // == Remove By Tag ==
    /// Removes every stored entry whose tag list contains `tag`, returning
    /// the removed keys. Full directory scan.
    pub async fn remove_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for entry in self.load_all().await? {
            if entry.tags.iter().any(|t| t == tag) {
                self.remove(&entry.key).await?;
                removed.push(entry.key);
            }
        }
        Ok(removed)
    }

    // == Clear ==
    /// Removes every stored entry.
    pub async fn clear(&self) -> Result<()> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        while let Some(file) = dir.next_entry().await? {
            if file.path().extension().map(|e| e == "json").unwrap_or(false) {
                fs::remove_file(file.path()).await?;
            }
        }
        Ok(())
    }

    // == Load All ==
    /// Reads every stored envelope, for startup rehydration.
    ///
    /// Unreadable or corrupt files are skipped with a warning rather than
    /// failing the whole load.
    pub async fn load_all(&self) -> Result<Vec<StoredEntry>> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        while let Some(file) = dir.next_entry().await? {
            let path = file.path();
            if !path.extension().map(|e| e == "json").unwrap_or(false) {
                continue;
            }
            match fs::read(&path).await {
                Ok(bytes) => match StoredEntry::from_bytes(&bytes) {
                    Ok(entry) => entries.push(entry),
                    Err(err) => {
                        warn!("skipping corrupt cache file {}: {}", path.display(), err);
                    }
                },
                Err(err) => {
                    warn!("skipping unreadable cache file {}: {}", path.display(), err);
                }
            }
        }
        Ok(entries)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn entry(payload: &[u8], tags: &[&str]) -> CacheEntry {
        let tags: HashSet<String> = tags.iter().map(|t| t.to_string()).collect();
        CacheEntry::new(payload.to_vec(), false, Some(300), tags)
    }

    #[test]
    fn test_stored_entry_roundtrip() {
        let original = entry(b"payload bytes", &["session"]);
        let stored = StoredEntry::from_entry("user:1", &original);

        assert_eq!(stored.key, "user:1");
        assert_eq!(stored.size_bytes, 13);
        assert!(!stored.is_expired());

        let restored = stored.clone().into_entry().unwrap();
        assert_eq!(restored.payload, b"payload bytes");
        assert_eq!(restored.created_at, original.created_at);
        assert_eq!(restored.expires_at, original.expires_at);
        assert!(restored.tags.contains("session"));
        assert_eq!(restored.access_count, 0);
    }

    #[test]
    fn test_stored_entry_wire_codec() {
        let stored = StoredEntry::from_entry("k", &entry(b"v", &[]));

        let bytes = stored.to_bytes().unwrap();
        let decoded = StoredEntry::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.key, "k");
        assert_eq!(decoded.payload, stored.payload);
    }

    #[tokio::test]
    async fn test_tier_store_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let tier = PersistentTier::new(dir.path());

        let stored = StoredEntry::from_entry("user:1", &entry(b"v1", &[]));
        tier.store(&stored).await.unwrap();

        let loaded = tier.load("user:1").await.unwrap().unwrap();
        assert_eq!(loaded.key, "user:1");

        tier.remove("user:1").await.unwrap();
        assert!(tier.load("user:1").await.unwrap().is_none());

        // Removing a missing key is not an error
        tier.remove("user:1").await.unwrap();
    }

    #[tokio::test]
    async fn test_tier_load_all_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let tier = PersistentTier::new(dir.path());

        tier.store(&StoredEntry::from_entry("a", &entry(b"1", &[])))
            .await
            .unwrap();
        tier.store(&StoredEntry::from_entry("b", &entry(b"2", &[])))
            .await
            .unwrap();

        let mut keys: Vec<String> = tier
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

        tier.clear().await.unwrap();
        assert!(tier.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tier_missing_directory_is_empty() {
        let tier = PersistentTier::new("/nonexistent/layercache-test-dir");

        assert!(tier.load_all().await.unwrap().is_empty());
        assert!(tier.load("k").await.unwrap().is_none());
        tier.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_tier_remove_by_tag() {
        let dir = tempfile::tempdir().unwrap();
        let tier = PersistentTier::new(dir.path());

        tier.store(&StoredEntry::from_entry("a", &entry(b"1", &["session"])))
            .await
            .unwrap();
        tier.store(&StoredEntry::from_entry("b", &entry(b"2", &["user"])))
            .await
            .unwrap();

        let removed = tier.remove_by_tag("session").await.unwrap();
        assert_eq!(removed, vec!["a".to_string()]);

        assert!(tier.load("a").await.unwrap().is_none());
        assert!(tier.load("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tier_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let tier = PersistentTier::new(dir.path());

        tier.store(&StoredEntry::from_entry("good", &entry(b"1", &[])))
            .await
            .unwrap();
        fs::write(dir.path().join("corrupt.json"), b"not json")
            .await
            .unwrap();

        let loaded = tier.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].key, "good");
    }
}
