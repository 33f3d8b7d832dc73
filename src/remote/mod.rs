//! Remote Tier Module
//!
//! The distributed adapter interface the engine consumes (but does not
//! own). A shared remote backend lets multiple processes observe a
//! roughly-consistent cached value; consistency is last-write-wins with no
//! conflict resolution. Every operation is fallible and network-bound, and
//! no failure from this interface may propagate as a failure of the overall
//! cache operation: the engine degrades to local-only behavior and logs.

mod memory;

pub use memory::InMemoryAdapter;

use async_trait::async_trait;
use thiserror::Error;

// == Remote Error ==
/// Failure vocabulary of the remote tier.
///
/// Connectivity loss is distinguished from backend errors because only the
/// former makes a failed write eligible for the offline queue.
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    /// The backend could not be reached (connectivity loss)
    #[error("remote backend unreachable: {0}")]
    Unavailable(String),

    /// The backend was reached but rejected or failed the operation
    #[error("remote backend error: {0}")]
    Backend(String),
}

impl RemoteError {
    /// Returns true when the failure is attributable to connectivity loss.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for remote tier operations.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

// == Distributed Adapter ==
/// A shared remote key-value backend used as a secondary
/// read-through/write-through tier.
///
/// Values are opaque byte payloads; the engine stores its wire envelope in
/// them and the adapter never interprets the contents. TTLs are expressed
/// in seconds.
#[async_trait]
pub trait DistributedAdapter: Send + Sync {
    /// Fetches the payload stored under `key`, if any.
    async fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>>;

    /// Stores a payload under `key` with an optional TTL in seconds.
    async fn set(&self, key: &str, value: &[u8], ttl_seconds: Option<u64>) -> RemoteResult<()>;

    /// Removes the payload stored under `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> RemoteResult<()>;

    /// Returns whether a live payload exists under `key`.
    async fn exists(&self, key: &str) -> RemoteResult<bool>;

    /// Removes every payload in the backend.
    async fn clear(&self) -> RemoteResult<()>;

    /// Lists the keys currently stored in the backend.
    async fn keys(&self) -> RemoteResult<Vec<String>>;

    /// Returns the remaining TTL in seconds for `key`, or None when the key
    /// is absent or has no expiry.
    async fn get_ttl(&self, key: &str) -> RemoteResult<Option<u64>>;

    /// Replaces the TTL of an existing key. Absent keys are ignored.
    async fn set_ttl(&self, key: &str, ttl_seconds: u64) -> RemoteResult<()>;
}
