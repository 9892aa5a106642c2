//! Error types for cache operations.
//!
//! Store failures are deliberately NOT represented here: per the store
//! contract they surface as boolean returns, never as errors. The variants
//! below cover the caller-facing failure modes only.

use thiserror::Error;

/// Errors surfaced by the cache facade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// An application key could not be serialized into its canonical
    /// encoding. Never silently coerced.
    #[error("Key cannot be encoded: {reason}")]
    KeyEncoding { reason: String },

    /// A value could not be serialized for storage.
    #[error("Value cannot be encoded: {reason}")]
    ValueEncoding { reason: String },

    /// A cached value does not decode as the requested type. This is a
    /// caller contract bug, distinct from a miss.
    #[error("Cached value for key {key} cannot be decoded: {reason}")]
    ValueDecoding { key: String, reason: String },

    /// A dependency failed while capturing its baseline or checking for
    /// change. Propagated to the caller unchanged.
    #[error("Dependency error: {reason}")]
    Dependency { reason: String },
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
