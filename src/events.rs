//! Cache Event Notifications
//!
//! Explicit observer interface for cache lifecycle events. Observers are
//! registered once at engine construction and invoked synchronously in
//! registration order, so delivery is deterministic.

// == Cache Event ==
/// A lifecycle event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A `get` was served from the memory tier
    Hit { key: String },
    /// A `get` found no valid local entry
    Miss { key: String },
    /// An entry was stored
    Set { key: String },
    /// An entry was explicitly deleted
    Deleted { key: String },
    /// An entry was evicted to satisfy a size or item limit
    Evicted { key: String },
    /// An expired entry was removed by the sweep
    Expired { key: String },
    /// A tag invalidation removed `removed` entries
    TagInvalidated { tag: String, removed: usize },
    /// The whole cache was cleared
    Cleared,
    /// A write could not reach the remote tier and was queued for replay
    WriteQueued { key: String },
    /// A queued write exhausted its replay retries and was dropped
    ReplayDropped { key: String },
}

// == Cache Observer ==
/// Receives cache lifecycle events.
///
/// Implementations must be cheap and non-blocking: they run inline on the
/// calling task, between the local operation and any tier write-through.
pub trait CacheObserver: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: &CacheEvent);
}
