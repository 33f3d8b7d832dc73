//! Error types for the caching engine
//!
//! Provides unified error handling using thiserror.
//!
//! Caching is an optimization rather than a correctness path, so most
//! internal failures are logged and swallowed inside the engine. The
//! variants here surface only where the caller expects a definite outcome:
//! administrative operations (`clear`, `delete_by_tag`) and explicit
//! rehydration.

use thiserror::Error;

use crate::remote::RemoteError;

// == Cache Error Enum ==
/// Unified error type for the caching engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value serialization or envelope decoding failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload encoding error (base64 envelope payload)
    #[error("payload encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Persistent tier or compression I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote tier failure surfaced from an administrative operation
    #[error("remote tier error: {0}")]
    Remote(#[from] RemoteError),
}

// == Result Type Alias ==
/// Convenience Result type for the caching engine.
pub type Result<T> = std::result::Result<T, CacheError>;
