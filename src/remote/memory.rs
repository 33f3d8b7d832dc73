//! In-Memory Remote Adapter
//!
//! A complete in-process implementation of [`DistributedAdapter`], used as
//! the reference backend in tests and as a stand-in when no shared backend
//! is deployed. An `offline` toggle simulates connectivity loss: while
//! offline every operation fails with `RemoteError::Unavailable`, which is
//! what routes engine writes into the offline queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::cache::entry::current_timestamp_ms;
use crate::remote::{DistributedAdapter, RemoteError, RemoteResult};

// == Stored Value ==
/// A payload plus its absolute expiry (Unix milliseconds).
#[derive(Debug, Clone)]
struct StoredValue {
    payload: Vec<u8>,
    expires_at: Option<u64>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }
}

// == In-Memory Adapter ==
/// In-process [`DistributedAdapter`] backend with TTL support.
#[derive(Debug, Default)]
pub struct InMemoryAdapter {
    entries: Mutex<HashMap<String, StoredValue>>,
    offline: AtomicBool,
}

impl InMemoryAdapter {
    // == Constructor ==
    /// Creates an empty, online adapter.
    pub fn new() -> Self {
        Self::default()
    }

    // == Connectivity Toggle ==
    /// Simulates connectivity loss (`true`) or recovery (`false`).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns whether the adapter is currently simulating connectivity loss.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    fn check_connectivity(&self) -> RemoteResult<()> {
        if self.is_offline() {
            Err(RemoteError::Unavailable("adapter is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DistributedAdapter for InMemoryAdapter {
    async fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        self.check_connectivity()?;
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(value) if value.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(value) => Ok(Some(value.payload.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl_seconds: Option<u64>) -> RemoteResult<()> {
        self.check_connectivity()?;
        let expires_at = ttl_seconds.map(|ttl| current_timestamp_ms() + ttl * 1000);
        self.entries.lock().await.insert(
            key.to_string(),
            StoredValue {
                payload: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> RemoteResult<()> {
        self.check_connectivity()?;
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> RemoteResult<bool> {
        self.check_connectivity()?;
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(value) if value.is_expired() => {
                entries.remove(key);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn clear(&self) -> RemoteResult<()> {
        self.check_connectivity()?;
        self.entries.lock().await.clear();
        Ok(())
    }

    async fn keys(&self) -> RemoteResult<Vec<String>> {
        self.check_connectivity()?;
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|(_, value)| !value.is_expired())
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn get_ttl(&self, key: &str) -> RemoteResult<Option<u64>> {
        self.check_connectivity()?;
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|value| !value.is_expired())
            .and_then(|value| value.expires_at)
            .map(|expires| expires.saturating_sub(current_timestamp_ms()) / 1000))
    }

    async fn set_ttl(&self, key: &str, ttl_seconds: u64) -> RemoteResult<()> {
        self.check_connectivity()?;
        let mut entries = self.entries.lock().await;
        if let Some(value) = entries.get_mut(key) {
            value.expires_at = Some(current_timestamp_ms() + ttl_seconds * 1000);
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_adapter_roundtrip() {
        let adapter = InMemoryAdapter::new();

        adapter.set("key1", b"value1", None).await.unwrap();

        assert_eq!(
            adapter.get("key1").await.unwrap(),
            Some(b"value1".to_vec())
        );
        assert!(adapter.exists("key1").await.unwrap());
        assert_eq!(adapter.keys().await.unwrap(), vec!["key1".to_string()]);
    }

    #[tokio::test]
    async fn test_adapter_delete_and_clear() {
        let adapter = InMemoryAdapter::new();
        adapter.set("a", b"1", None).await.unwrap();
        adapter.set("b", b"2", None).await.unwrap();

        adapter.delete("a").await.unwrap();
        assert!(!adapter.exists("a").await.unwrap());

        adapter.clear().await.unwrap();
        assert!(adapter.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adapter_ttl_expiry() {
        let adapter = InMemoryAdapter::new();
        adapter.set("key1", b"v", Some(60)).await.unwrap();

        // Force expiry without waiting
        adapter
            .entries
            .lock()
            .await
            .get_mut("key1")
            .unwrap()
            .expires_at = Some(current_timestamp_ms().saturating_sub(1000));

        assert_eq!(adapter.get("key1").await.unwrap(), None);
        assert!(!adapter.exists("key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_adapter_get_ttl_and_set_ttl() {
        let adapter = InMemoryAdapter::new();
        adapter.set("key1", b"v", Some(60)).await.unwrap();

        let remaining = adapter.get_ttl("key1").await.unwrap().unwrap();
        assert!(remaining <= 60);

        adapter.set_ttl("key1", 600).await.unwrap();
        let extended = adapter.get_ttl("key1").await.unwrap().unwrap();
        assert!(extended > 60);

        assert_eq!(adapter.get_ttl("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_adapter_offline_fails_with_connectivity_error() {
        let adapter = InMemoryAdapter::new();
        adapter.set_offline(true);

        let err = adapter.set("key1", b"v", None).await.unwrap_err();
        assert!(err.is_connectivity());
        assert!(adapter.get("key1").await.is_err());

        adapter.set_offline(false);
        adapter.set("key1", b"v", None).await.unwrap();
        assert!(adapter.exists("key1").await.unwrap());
    }
}
