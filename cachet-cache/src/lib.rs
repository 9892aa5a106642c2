//! Caching facade with key normalization and dependency-based
//! invalidation.
//!
//! This crate puts a [`Cache`] in front of any key-value [`Store`] and
//! adds what the store itself does not provide:
//!
//! - deterministic normalization of arbitrary application keys into
//!   storage-safe key strings ([`key`])
//! - value-level invalidation through attached [`Dependency`] detectors,
//!   re-checked on every read independently of store TTL expiry
//! - a compute-if-absent read-through helper ([`Cache::get_or_set`]) that
//!   tolerates store write failures
//!
//! # Example
//!
//! ```
//! use cachet_cache::{Cache, Dependency};
//! use cachet_store::MemoryStore;
//! use std::sync::Arc;
//!
//! let cache = Cache::new(Arc::new(MemoryStore::new()));
//!
//! // Cache a derived value that invalidates when its input changes.
//! cache.set("input", &10, None, None).unwrap();
//! cache
//!     .set("derived", &20, None, Some(Dependency::value("input")))
//!     .unwrap();
//!
//! cache.set("input", &11, None, None).unwrap();
//! assert_eq!(cache.get::<i64>("derived").unwrap(), None);
//! ```

pub mod dependency;
pub mod entry;
pub mod error;
pub mod facade;
pub mod key;

pub use dependency::{
    Dependency, DependencyCheck, FileDependency, TagDependency, ValueDependency,
};
pub use entry::StoredEntry;
pub use error::{CacheError, CacheResult};
pub use facade::{Cache, CacheConfig};
pub use key::{build_key, CacheKey, RawKey};

// Convenience re-export so facade users need not depend on the store crate
// for the contract trait.
pub use cachet_store::Store;
