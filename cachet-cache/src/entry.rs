//! The wire shape of values the facade places in the store.
//!
//! An explicit tagged union distinguishes plain values from values carrying
//! a dependency snapshot. The tag removes any structural ambiguity: a
//! legitimately cached two-element value can never be mistaken for a
//! dependency pair.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dependency::Dependency;
use crate::error::{CacheError, CacheResult};

/// A value as stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredEntry {
    /// The raw cached value; produced by writes without a dependency.
    Plain { value: Value },
    /// The cached value plus the dependency snapshot captured at write
    /// time; produced only by writes that attached a dependency.
    Dependent { value: Value, dependency: Dependency },
}

impl StoredEntry {
    /// Wrap a value, attaching the (already evaluated) dependency if any.
    pub fn wrap(value: Value, dependency: Option<Dependency>) -> Self {
        match dependency {
            Some(dependency) => Self::Dependent { value, dependency },
            None => Self::Plain { value },
        }
    }

    /// Encode the entry into the store's value representation.
    pub fn encode(&self) -> CacheResult<Value> {
        serde_json::to_value(self).map_err(|e| CacheError::ValueEncoding {
            reason: e.to_string(),
        })
    }

    /// Decode a store value back into an entry.
    ///
    /// Returns `None` for values that do not carry the entry tag (foreign
    /// writers, corrupted entries); the facade treats those as a miss.
    pub fn decode(stored: Value) -> Option<Self> {
        serde_json::from_value(stored).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Dependency;
    use serde_json::json;

    #[test]
    fn test_plain_roundtrip() {
        let entry = StoredEntry::wrap(json!({"name": "Ann"}), None);
        let encoded = entry.encode().unwrap();
        assert_eq!(encoded["kind"], "plain");
        assert_eq!(StoredEntry::decode(encoded), Some(entry));
    }

    #[test]
    fn test_dependent_roundtrip() {
        let entry = StoredEntry::wrap(json!([1, 2]), Some(Dependency::value("watched")));
        let encoded = entry.encode().unwrap();
        assert_eq!(encoded["kind"], "dependent");
        assert_eq!(StoredEntry::decode(encoded), Some(entry));
    }

    #[test]
    fn test_foreign_value_decodes_as_none() {
        assert_eq!(StoredEntry::decode(json!(42)), None);
        assert_eq!(StoredEntry::decode(json!(["value", {"looks": "dependent"}])), None);
        assert_eq!(StoredEntry::decode(json!({"value": 1})), None);
    }

    #[test]
    fn test_two_element_value_is_unambiguous() {
        // A cached value that happens to look like a (value, dependency)
        // pair stays a plain value thanks to the tag.
        let pair = json!(["payload", {"kind": "file", "path": "/tmp/x"}]);
        let entry = StoredEntry::wrap(pair.clone(), None);
        let decoded = StoredEntry::decode(entry.encode().unwrap()).unwrap();
        assert_eq!(decoded, StoredEntry::Plain { value: pair });
    }
}
