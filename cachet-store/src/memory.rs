//! In-process store backed by a `HashMap`.
//!
//! Expiry is lazy: an entry past its deadline is treated as absent on read
//! and removed the next time a write path touches the map. There is no
//! background sweeper.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::Store;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory [`Store`] with per-entry deadlines.
///
/// Thread-safe via an `RwLock`; a poisoned lock degrades every operation to
/// its contract failure value instead of panicking.
///
/// # Example
///
/// ```
/// use cachet_store::{MemoryStore, Store};
/// use serde_json::json;
///
/// let store = MemoryStore::new();
/// assert!(store.set("alpha", json!(1), None));
/// assert_eq!(store.get("alpha"), Some(json!(1)));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    default_ttl: Option<Duration>,
}

impl MemoryStore {
    /// Create a store whose entries never expire unless a TTL is given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that applies `ttl` to every write made without an
    /// explicit TTL.
    pub fn with_default_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl: Some(ttl),
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|map| map.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    /// Whether the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn deadline(&self, ttl: Option<Duration>) -> Option<Instant> {
        ttl.or(self.default_ttl).map(|d| Instant::now() + d)
    }

    /// Drop entries past their deadline. Called once per write so expired
    /// entries do not accumulate.
    fn purge_expired(map: &mut HashMap<String, MemoryEntry>) {
        let now = Instant::now();
        map.retain(|_, entry| !entry.is_expired(now));
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let map = self.entries.read().ok()?;
        let entry = map.get(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry.value.clone())
    }

    fn get_multiple(&self, keys: &[String]) -> HashMap<String, Value> {
        let Ok(map) = self.entries.read() else {
            return HashMap::new();
        };
        let now = Instant::now();
        keys.iter()
            .filter_map(|key| {
                let entry = map.get(key)?;
                if entry.is_expired(now) {
                    return None;
                }
                Some((key.clone(), entry.value.clone()))
            })
            .collect()
    }

    fn has(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|map| map.get(key).is_some_and(|e| !e.is_expired(Instant::now())))
            .unwrap_or(false)
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        let deadline = self.deadline(ttl);
        let Ok(mut map) = self.entries.write() else {
            return false;
        };
        Self::purge_expired(&mut map);
        map.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: deadline,
            },
        );
        true
    }

    fn set_multiple(&self, entries: Vec<(String, Value)>, ttl: Option<Duration>) -> bool {
        let deadline = self.deadline(ttl);
        let Ok(mut map) = self.entries.write() else {
            return false;
        };
        Self::purge_expired(&mut map);
        for (key, value) in entries {
            map.insert(
                key,
                MemoryEntry {
                    value,
                    expires_at: deadline,
                },
            );
        }
        true
    }

    fn delete(&self, key: &str) -> bool {
        let Ok(mut map) = self.entries.write() else {
            return false;
        };
        map.remove(key);
        true
    }

    fn delete_multiple(&self, keys: &[String]) -> bool {
        let Ok(mut map) = self.entries.write() else {
            return false;
        };
        for key in keys {
            map.remove(key);
        }
        true
    }

    fn clear(&self) -> bool {
        let Ok(mut map) = self.entries.write() else {
            return false;
        };
        map.clear();
        true
    }
}
