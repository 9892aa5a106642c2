//! Key-value store contract and backends for the cachet cache facade.
//!
//! This crate provides:
//! - [`Store`]: the minimal synchronous key-value contract the facade
//!   depends on
//! - [`MemoryStore`]: in-process `HashMap` store with lazy TTL expiry
//! - [`LmdbStore`]: memory-mapped persistent store backed by LMDB (heed)
//!
//! # Failure model
//!
//! The contract deliberately carries no error type. Write-family operations
//! report success as `bool`; read-family operations report absence as
//! `None` / an omitted map entry. A backend that hits an internal fault
//! (poisoned lock, failed transaction) degrades to the failure value for
//! that operation rather than panicking or surfacing an error.

pub mod lmdb;
pub mod memory;

pub use lmdb::{LmdbStore, LmdbStoreError};
pub use memory::MemoryStore;

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

/// Minimal synchronous key-value backend contract.
///
/// Keys are storage-safe strings (the facade normalizes application keys
/// before delegating). Values are arbitrary JSON documents.
///
/// # TTL
///
/// `ttl` is an absolute duration from the moment of the write. `None` means
/// the backend's own default applies; a backend with no default keeps the
/// entry until it is overwritten or deleted.
///
/// # Atomicity
///
/// Single-key writes are as atomic as the backend makes them. The batch
/// operations are NOT guaranteed atomic across keys: a partial failure may
/// leave some keys written and others not, and the aggregate `bool` is the
/// backend's own verdict on the batch.
pub trait Store: Send + Sync {
    /// Get the value stored under `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> Option<Value>;

    /// Get the values stored under `keys`. Absent or expired keys are
    /// omitted from the result map.
    fn get_multiple(&self, keys: &[String]) -> HashMap<String, Value>;

    /// Whether an entry is present (and unexpired) under `key`.
    fn has(&self, key: &str) -> bool;

    /// Store `value` under `key`. Returns `false` on failure.
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool;

    /// Store every `(key, value)` pair with a shared TTL. Returns the
    /// backend's aggregate verdict.
    fn set_multiple(&self, entries: Vec<(String, Value)>, ttl: Option<Duration>) -> bool;

    /// Remove the entry under `key`. Returns `false` on failure; removing
    /// an absent key is not a failure.
    fn delete(&self, key: &str) -> bool;

    /// Remove every entry under `keys`.
    fn delete_multiple(&self, keys: &[String]) -> bool;

    /// Remove ALL entries in the backend.
    fn clear(&self) -> bool;
}
