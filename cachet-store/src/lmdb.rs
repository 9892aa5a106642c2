//! LMDB-backed store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a persistent,
//! memory-mapped key-value store.
//!
//! # Value framing
//!
//! Every stored value is framed as `[deadline: 8 bytes LE][json bytes]`,
//! where `deadline` is the absolute expiry as Unix milliseconds and `0`
//! means the entry never expires. Expiry is lazy: an entry past its
//! deadline reads as absent and is physically removed on the next write
//! that touches its key.
//!
//! # Thread safety
//!
//! LMDB provides ACID transactions. Reads run in read transactions, writes
//! in write transactions. Internal faults are swallowed into the [`Store`]
//! contract's failure values, with a debug-level trace breadcrumb.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use serde_json::Value;

use crate::Store;

/// Error type for LMDB store construction and internal operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistent [`Store`] backed by LMDB.
///
/// # Example
///
/// ```ignore
/// use cachet_store::{LmdbStore, Store};
/// use serde_json::json;
///
/// let store = LmdbStore::new("/var/cache/app", 100)?;
/// store.set("greeting", json!("hello"), None);
/// ```
pub struct LmdbStore {
    env: Env,
    db: Database<Str, Bytes>,
    default_ttl: Option<Duration>,
}

impl LmdbStore {
    /// Open (or create) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where the LMDB files live
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment/database cannot be opened.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            default_ttl: None,
        })
    }

    /// Apply `ttl` to every write made without an explicit TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    fn deadline_millis(&self, ttl: Option<Duration>) -> i64 {
        match ttl.or(self.default_ttl) {
            Some(ttl) => Utc::now().timestamp_millis().saturating_add(ttl.as_millis() as i64),
            None => 0,
        }
    }

    fn encode_value(value: &Value, deadline_millis: i64) -> Option<Vec<u8>> {
        let json = match serde_json::to_vec(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::debug!(error = %e, "failed to encode value for LMDB");
                return None;
            }
        };
        let mut framed = Vec::with_capacity(8 + json.len());
        framed.extend_from_slice(&deadline_millis.to_le_bytes());
        framed.extend_from_slice(&json);
        Some(framed)
    }

    /// Decode a framed value, returning `None` for malformed or expired
    /// entries.
    fn decode_value(bytes: &[u8]) -> Option<Value> {
        if bytes.len() < 8 {
            return None;
        }
        let deadline_bytes: [u8; 8] = bytes[0..8].try_into().ok()?;
        let deadline_millis = i64::from_le_bytes(deadline_bytes);
        if deadline_millis != 0 && Utc::now().timestamp_millis() >= deadline_millis {
            return None;
        }
        serde_json::from_slice(&bytes[8..]).ok()
    }

    fn put_one(&self, key: &str, value: &Value, deadline_millis: i64) -> Result<(), LmdbStoreError> {
        let framed = Self::encode_value(value, deadline_millis)
            .ok_or_else(|| LmdbStoreError::Serialization("value encoding failed".into()))?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, key, &framed)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))
    }
}

impl Store for LmdbStore {
    fn get(&self, key: &str) -> Option<Value> {
        let rtxn = match self.env.read_txn() {
            Ok(rtxn) => rtxn,
            Err(e) => {
                tracing::debug!(error = %e, "LMDB read transaction failed");
                return None;
            }
        };
        match self.db.get(&rtxn, key) {
            Ok(Some(bytes)) => Self::decode_value(bytes),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(error = %e, key, "LMDB get failed");
                None
            }
        }
    }

    fn get_multiple(&self, keys: &[String]) -> HashMap<String, Value> {
        let mut found = HashMap::new();
        let Ok(rtxn) = self.env.read_txn() else {
            return found;
        };
        for key in keys {
            if let Ok(Some(bytes)) = self.db.get(&rtxn, key) {
                if let Some(value) = Self::decode_value(bytes) {
                    found.insert(key.clone(), value);
                }
            }
        }
        found
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        let deadline = self.deadline_millis(ttl);
        match self.put_one(key, &value, deadline) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, key, "LMDB set failed");
                false
            }
        }
    }

    fn set_multiple(&self, entries: Vec<(String, Value)>, ttl: Option<Duration>) -> bool {
        let deadline = self.deadline_millis(ttl);

        let mut framed_entries = Vec::with_capacity(entries.len());
        for (key, value) in &entries {
            match Self::encode_value(value, deadline) {
                Some(framed) => framed_entries.push((key, framed)),
                None => return false,
            }
        }

        let Ok(mut wtxn) = self.env.write_txn() else {
            return false;
        };
        for (key, framed) in &framed_entries {
            if self.db.put(&mut wtxn, key.as_str(), framed).is_err() {
                return false;
            }
        }
        match wtxn.commit() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "LMDB batch commit failed");
                false
            }
        }
    }

    fn delete(&self, key: &str) -> bool {
        let Ok(mut wtxn) = self.env.write_txn() else {
            return false;
        };
        // Deleting an absent key is not a failure.
        if self.db.delete(&mut wtxn, key).is_err() {
            return false;
        }
        wtxn.commit().is_ok()
    }

    fn delete_multiple(&self, keys: &[String]) -> bool {
        let Ok(mut wtxn) = self.env.write_txn() else {
            return false;
        };
        for key in keys {
            if self.db.delete(&mut wtxn, key).is_err() {
                return false;
            }
        }
        wtxn.commit().is_ok()
    }

    fn clear(&self) -> bool {
        let Ok(mut wtxn) = self.env.write_txn() else {
            return false;
        };
        if self.db.clear(&mut wtxn).is_err() {
            return false;
        }
        wtxn.commit().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbStore::new(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    #[test]
    fn test_set_and_get() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.set("a", json!({"n": 1}), None));
        assert_eq!(store.get("a"), Some(json!({"n": 1})));
        assert!(store.has("a"));
    }

    #[test]
    fn test_get_absent() {
        let (store, _temp_dir) = create_test_store();
        assert_eq!(store.get("missing"), None);
        assert!(!store.has("missing"));
    }

    #[test]
    fn test_overwrite() {
        let (store, _temp_dir) = create_test_store();
        store.set("a", json!("old"), None);
        store.set("a", json!("new"), None);
        assert_eq!(store.get("a"), Some(json!("new")));
    }

    #[test]
    fn test_ttl_expiry() {
        let (store, _temp_dir) = create_test_store();
        store.set("short", json!(1), Some(Duration::from_millis(10)));
        assert!(store.has("short"));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(store.get("short"), None);
        assert!(!store.has("short"));
    }

    #[test]
    fn test_default_ttl_applies_when_omitted() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbStore::new(temp_dir.path(), 10)
            .expect("store creation should succeed")
            .with_default_ttl(Duration::from_millis(10));

        store.set("a", json!(1), None);
        store.set("b", json!(2), Some(Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), Some(json!(2)));
    }

    #[test]
    fn test_set_multiple_and_get_multiple() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.set_multiple(
            vec![("a".into(), json!(1)), ("b".into(), json!(2))],
            None,
        ));

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let found = store.get_multiple(&keys);
        assert_eq!(found.len(), 2);
        assert_eq!(found.get("a"), Some(&json!(1)));
        assert_eq!(found.get("b"), Some(&json!(2)));
    }

    #[test]
    fn test_delete() {
        let (store, _temp_dir) = create_test_store();
        store.set("a", json!(1), None);
        assert!(store.delete("a"));
        assert_eq!(store.get("a"), None);
        // Absent key deletion is fine.
        assert!(store.delete("a"));
    }

    #[test]
    fn test_delete_multiple() {
        let (store, _temp_dir) = create_test_store();
        store.set("a", json!(1), None);
        store.set("b", json!(2), None);
        assert!(store.delete_multiple(&["a".to_string(), "b".to_string()]));
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn test_clear() {
        let (store, _temp_dir) = create_test_store();
        store.set("a", json!(1), None);
        store.set("b", json!(2), None);
        assert!(store.clear());
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        {
            let store =
                LmdbStore::new(temp_dir.path(), 10).expect("store creation should succeed");
            store.set("durable", json!("value"), None);
        }
        let store = LmdbStore::new(temp_dir.path(), 10).expect("store reopen should succeed");
        assert_eq!(store.get("durable"), Some(json!("value")));
    }
}
