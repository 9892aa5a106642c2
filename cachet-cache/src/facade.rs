//! The cache facade.
//!
//! [`Cache`] sits in front of a [`Store`] and adds key normalization,
//! dependency-based invalidation and a compute-if-absent helper. It holds
//! no mutable state beyond the store reference, so a single instance can be
//! shared across threads whenever the store itself is thread-safe.
//!
//! # Failure model
//!
//! Reads never fail for cache-internal reasons: a stale, invalidated or
//! undecodable entry degrades to a miss. Writes report the store's verdict
//! as a plain `bool`, with no retries and no transformation. Errors are
//! reserved for caller-side contract breaches (unserializable keys or
//! values, type-mismatched reads) and for failures inside caller-supplied
//! dependencies.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use cachet_store::Store;

use crate::dependency::{Dependency, DependencyCheck};
use crate::entry::StoredEntry;
use crate::error::{CacheError, CacheResult};
use crate::key::{build_key, CacheKey, RawKey};

/// Configuration for a [`Cache`].
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// TTL applied when an operation passes `None`. `None` here defers to
    /// the store's own default.
    pub default_ttl: Option<Duration>,
    /// Prefix prepended to every normalized key. Lets several logical
    /// caches share one store without colliding. Empty by default.
    pub key_prefix: String,
}

impl CacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TTL used when an operation omits one.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

/// Caching facade over an arbitrary key-value [`Store`].
///
/// # Example
///
/// ```
/// use cachet_cache::Cache;
/// use cachet_store::MemoryStore;
/// use std::sync::Arc;
///
/// let cache = Cache::new(Arc::new(MemoryStore::new()));
/// cache.set("greeting", &"hello", None, None).unwrap();
/// assert_eq!(cache.get::<String>("greeting").unwrap().as_deref(), Some("hello"));
/// ```
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn Store>,
    config: CacheConfig,
}

impl Cache {
    /// Create a facade over `store` with the default configuration.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    /// Create a facade over `store` with an explicit configuration.
    pub fn with_config(store: Arc<dyn Store>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The underlying store.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Replace the underlying store.
    pub fn set_store(&mut self, store: Arc<dyn Store>) {
        self.store = store;
    }

    /// Normalize an application key into the storage key this facade would
    /// use for it (configured prefix included).
    pub fn build_key(&self, key: impl Into<RawKey>) -> CacheResult<CacheKey> {
        self.normalize(&key.into())
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Get the value cached under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent, expired, or its
    /// dependency reports change; those outcomes are indistinguishable by
    /// design.
    pub fn get<T: DeserializeOwned>(&self, key: impl Into<RawKey>) -> CacheResult<Option<T>> {
        let cache_key = self.normalize(&key.into())?;
        let Some(stored) = self.store.get(cache_key.as_str()) else {
            return Ok(None);
        };
        let Some(value) = self.resolve_entry(stored)? else {
            return Ok(None);
        };
        self.decode_value(value, &cache_key).map(Some)
    }

    /// [`Cache::get`] with a fallback for the miss case.
    pub fn get_or<T: DeserializeOwned>(&self, key: impl Into<RawKey>, default: T) -> CacheResult<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Get several values in one store round trip.
    ///
    /// The result pairs each *original* key, in input order, with its value
    /// or `None`; normalized keys never leak to the caller. A key that is
    /// absent from the store or invalidated by its dependency yields
    /// `None`.
    pub fn get_multiple<T: DeserializeOwned>(
        &self,
        keys: &[RawKey],
    ) -> CacheResult<Vec<(RawKey, Option<T>)>> {
        let mut normalized = Vec::with_capacity(keys.len());
        for key in keys {
            normalized.push(self.normalize(key)?);
        }
        let storage_keys: Vec<String> = normalized.iter().map(|k| k.as_str().to_string()).collect();
        let fetched = self.store.get_multiple(&storage_keys);

        let mut results = Vec::with_capacity(keys.len());
        for (raw, cache_key) in keys.iter().zip(&normalized) {
            let resolved = match fetched.get(cache_key.as_str()) {
                Some(stored) if !stored.is_null() => self.resolve_entry(stored.clone())?,
                _ => None,
            };
            let typed = match resolved {
                Some(value) => Some(self.decode_value(value, cache_key)?),
                None => None,
            };
            results.push((raw.clone(), typed));
        }
        Ok(results)
    }

    /// Whether a store entry exists under `key`.
    ///
    /// Intentionally does NOT consult dependency state: this answers "is
    /// the store entry present", not "is the cached value still valid". A
    /// dependency-invalidated key reports `true` here while [`Cache::get`]
    /// misses.
    pub fn has(&self, key: impl Into<RawKey>) -> CacheResult<bool> {
        let cache_key = self.normalize(&key.into())?;
        Ok(self.store.has(cache_key.as_str()))
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Store `value` under `key`.
    ///
    /// When a dependency is given it is evaluated first (it receives this
    /// facade and may itself read the cache), then stored alongside the
    /// value. Returns the store's verdict.
    pub fn set<T: Serialize>(
        &self,
        key: impl Into<RawKey>,
        value: &T,
        ttl: Option<Duration>,
        dependency: Option<Dependency>,
    ) -> CacheResult<bool> {
        let raw = key.into();
        // Evaluate before anything is stored; the dependency may read
        // other entries while capturing its baseline.
        let dependency = self.evaluate_dependency(dependency)?;
        let entry = self.wrap_value(value, dependency)?;
        let cache_key = self.normalize(&raw)?;
        Ok(self
            .store
            .set(cache_key.as_str(), entry, self.effective_ttl(ttl)))
    }

    /// Store `value` under `key` only if the key is vacant.
    ///
    /// Check-then-act: the existence check and the write are not atomic,
    /// so concurrent writers may still race. The store's own check is
    /// authoritative; no compare-and-swap layer is added.
    pub fn add<T: Serialize>(
        &self,
        key: impl Into<RawKey>,
        value: &T,
        ttl: Option<Duration>,
        dependency: Option<Dependency>,
    ) -> CacheResult<bool> {
        let cache_key = self.normalize(&key.into())?;
        if self.store.has(cache_key.as_str()) {
            return Ok(false);
        }
        let dependency = self.evaluate_dependency(dependency)?;
        let entry = self.wrap_value(value, dependency)?;
        Ok(self
            .store
            .set(cache_key.as_str(), entry, self.effective_ttl(ttl)))
    }

    /// Store several values in one batched write.
    ///
    /// The dependency is evaluated ONCE for the whole batch; every item
    /// shares the same baseline. The batch is not atomic across keys.
    pub fn set_multiple<T: Serialize>(
        &self,
        items: &[(RawKey, T)],
        ttl: Option<Duration>,
        dependency: Option<Dependency>,
    ) -> CacheResult<bool> {
        let dependency = self.evaluate_dependency(dependency)?;
        let entries = self.wrap_items(items, &dependency)?;
        Ok(self.store.set_multiple(entries, self.effective_ttl(ttl)))
    }

    /// Store several values, skipping keys that already hold one.
    ///
    /// Same race caveat as [`Cache::add`]; the existence read is batched.
    pub fn add_multiple<T: Serialize>(
        &self,
        items: &[(RawKey, T)],
        ttl: Option<Duration>,
        dependency: Option<Dependency>,
    ) -> CacheResult<bool> {
        let mut normalized = Vec::with_capacity(items.len());
        for (key, value) in items {
            normalized.push((self.normalize(key)?, value));
        }
        let storage_keys: Vec<String> = normalized
            .iter()
            .map(|(k, _)| k.as_str().to_string())
            .collect();
        let existing = self.store.get_multiple(&storage_keys);

        let dependency = self.evaluate_dependency(dependency)?;
        let mut entries = Vec::new();
        for (cache_key, value) in normalized {
            if existing
                .get(cache_key.as_str())
                .is_some_and(|v| !v.is_null())
            {
                continue;
            }
            let entry = self.wrap_value(value, dependency.clone())?;
            entries.push((cache_key.into_string(), entry));
        }
        Ok(self.store.set_multiple(entries, self.effective_ttl(ttl)))
    }

    // ------------------------------------------------------------------
    // Read-through helper
    // ------------------------------------------------------------------

    /// Get the cached value, or compute and store it.
    ///
    /// The producer runs exactly once per miss and receives this facade so
    /// it may read other entries. Its result is returned even when the
    /// subsequent store write fails; that failure is reported as a single
    /// warning naming the key, never as an error.
    ///
    /// No single-flight collapsing is provided: concurrent callers racing
    /// on the same missing key each invoke their producer and each write.
    /// Callers needing request collapsing must add it externally.
    pub fn get_or_set<T, F>(
        &self,
        key: impl Into<RawKey>,
        producer: F,
        ttl: Option<Duration>,
        dependency: Option<Dependency>,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&Cache) -> CacheResult<T>,
    {
        let raw = key.into();
        if let Some(hit) = self.get(raw.clone())? {
            return Ok(hit);
        }
        let value = producer(self)?;
        if !self.set(raw.clone(), &value, ttl, dependency)? {
            let cache_key = self.normalize(&raw)?;
            tracing::warn!(key = %cache_key, "failed to store computed value; returning it uncached");
        }
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Remove the entry under `key`.
    pub fn delete(&self, key: impl Into<RawKey>) -> CacheResult<bool> {
        let cache_key = self.normalize(&key.into())?;
        Ok(self.store.delete(cache_key.as_str()))
    }

    /// Remove the entries under `keys` in one batched call.
    pub fn delete_multiple(&self, keys: &[RawKey]) -> CacheResult<bool> {
        let mut storage_keys = Vec::with_capacity(keys.len());
        for key in keys {
            storage_keys.push(self.normalize(key)?.into_string());
        }
        Ok(self.store.delete_multiple(&storage_keys))
    }

    /// Remove ALL entries from the underlying store.
    ///
    /// Dangerous when the store is shared: this wipes every entry in the
    /// backend, including those written by other logical caches (key
    /// prefixes do not protect against it).
    pub fn clear(&self) -> bool {
        self.store.clear()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn normalize(&self, key: &RawKey) -> CacheResult<CacheKey> {
        let normalized = build_key(key)?;
        if self.config.key_prefix.is_empty() {
            Ok(normalized)
        } else {
            Ok(normalized.with_prefix(&self.config.key_prefix))
        }
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.or(self.config.default_ttl)
    }

    /// Evaluate a caller-supplied dependency against this facade,
    /// returning it with its baseline captured.
    fn evaluate_dependency(&self, dependency: Option<Dependency>) -> CacheResult<Option<Dependency>> {
        match dependency {
            Some(mut dependency) => {
                dependency.evaluate(self)?;
                Ok(Some(dependency))
            }
            None => Ok(None),
        }
    }

    fn wrap_value<T: Serialize>(
        &self,
        value: &T,
        dependency: Option<Dependency>,
    ) -> CacheResult<Value> {
        let value = serde_json::to_value(value).map_err(|e| CacheError::ValueEncoding {
            reason: e.to_string(),
        })?;
        StoredEntry::wrap(value, dependency).encode()
    }

    fn wrap_items<T: Serialize>(
        &self,
        items: &[(RawKey, T)],
        dependency: &Option<Dependency>,
    ) -> CacheResult<Vec<(String, Value)>> {
        let mut entries = Vec::with_capacity(items.len());
        for (key, value) in items {
            let cache_key = self.normalize(key)?;
            let entry = self.wrap_value(value, dependency.clone())?;
            entries.push((cache_key.into_string(), entry));
        }
        Ok(entries)
    }

    /// Unwrap a store value: decode the entry tag, consult the dependency
    /// if one is attached, and yield the inner value or a miss.
    fn resolve_entry(&self, stored: Value) -> CacheResult<Option<Value>> {
        let Some(entry) = StoredEntry::decode(stored) else {
            // Foreign or corrupted store value: a miss, not an error.
            return Ok(None);
        };
        match entry {
            StoredEntry::Plain { value } => Ok(Some(value)),
            StoredEntry::Dependent { value, dependency } => {
                if dependency.is_changed(self)? {
                    Ok(None)
                } else {
                    Ok(Some(value))
                }
            }
        }
    }

    fn decode_value<T: DeserializeOwned>(&self, value: Value, key: &CacheKey) -> CacheResult<T> {
        serde_json::from_value(value).map_err(|e| CacheError::ValueDecoding {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}
