//! Deterministic normalization of application keys into storage-safe keys.
//!
//! Short alphanumeric string keys pass through unchanged so that common
//! keys stay human-readable in the store. Everything else is reduced to a
//! fixed-width 128-bit digest rendered as lowercase hex, so arbitrarily
//! shaped keys (long strings, numbers, composites) always map to a bounded,
//! storage-safe string.
//!
//! # Determinism
//!
//! Structured keys are canonicalized as JSON before hashing. Object members
//! keep their insertion order (serde_json's `preserve_order` feature), so
//! the same construction order always yields the same storage key.

use std::fmt;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, CacheResult};

/// Longest string key that may pass through normalization unchanged.
pub const INLINE_KEY_MAX_LEN: usize = 32;

/// An application-level cache key before normalization.
///
/// Construct via the `From` conversions for common shapes, or
/// [`RawKey::structured`] for any serializable composite:
///
/// ```
/// use cachet_cache::key::RawKey;
///
/// let simple = RawKey::from("user42");
/// let composite = RawKey::structured(&("profile", 42_u64)).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawKey {
    /// A plain string key, hashed directly when it misses the fast path.
    Text(String),
    /// Any other key shape, canonicalized as JSON before hashing.
    Structured(Value),
}

impl RawKey {
    /// Build a structured key from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::KeyEncoding`] when the value has no
    /// deterministic JSON form (for example a map with non-string keys or
    /// a non-finite float).
    pub fn structured<T: Serialize>(key: &T) -> CacheResult<Self> {
        let value = serde_json::to_value(key).map_err(|e| CacheError::KeyEncoding {
            reason: e.to_string(),
        })?;
        Ok(Self::Structured(value))
    }
}

impl From<&str> for RawKey {
    fn from(key: &str) -> Self {
        Self::Text(key.to_string())
    }
}

impl From<String> for RawKey {
    fn from(key: String) -> Self {
        Self::Text(key)
    }
}

impl From<i64> for RawKey {
    fn from(key: i64) -> Self {
        Self::Structured(Value::from(key))
    }
}

impl From<u64> for RawKey {
    fn from(key: u64) -> Self {
        Self::Structured(Value::from(key))
    }
}

impl From<Value> for RawKey {
    fn from(key: Value) -> Self {
        Self::Structured(key)
    }
}

/// A normalized, storage-safe cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// View the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, yielding the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Prepend a namespace prefix to an already-normalized key.
    pub(crate) fn with_prefix(&self, prefix: &str) -> CacheKey {
        CacheKey(format!("{prefix}{}", self.0))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether a string key may be used as a storage key unchanged.
fn is_inline_safe(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= INLINE_KEY_MAX_LEN
        && key.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Normalize an application key into a storage-safe key.
///
/// - Pure ASCII alphanumeric strings of at most 32 bytes pass through
///   unchanged.
/// - Any other string is hashed directly over its UTF-8 bytes.
/// - Structured keys are hashed over their canonical JSON encoding.
///
/// The function is pure: the same input always yields the same output.
pub fn build_key(key: &RawKey) -> CacheResult<CacheKey> {
    match key {
        RawKey::Text(s) if is_inline_safe(s) => Ok(CacheKey(s.clone())),
        RawKey::Text(s) => Ok(CacheKey(digest_hex(s.as_bytes()))),
        RawKey::Structured(v) => {
            let canonical = serde_json::to_string(v).map_err(|e| CacheError::KeyEncoding {
                reason: e.to_string(),
            })?;
            Ok(CacheKey(digest_hex(canonical.as_bytes())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fast_path_passes_through() {
        for key in ["a", "user42", "ABC123", "00000000000000000000000000000000"] {
            let built = build_key(&RawKey::from(key)).unwrap();
            assert_eq!(built.as_str(), key);
        }
    }

    #[test]
    fn test_fast_path_rejects_empty_string() {
        let built = build_key(&RawKey::from("")).unwrap();
        // MD5 of the empty input.
        assert_eq!(built.as_str(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_non_alphanumeric_string_is_hashed() {
        let built = build_key(&RawKey::from("user:42")).unwrap();
        assert_eq!(built.as_str().len(), 32);
        assert!(built.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(built.as_str(), "user:42");
    }

    #[test]
    fn test_long_string_is_hashed() {
        let key = "a".repeat(33);
        let built = build_key(&RawKey::from(key.as_str())).unwrap();
        assert_eq!(built.as_str().len(), 32);
    }

    #[test]
    fn test_boundary_length_is_inline() {
        let key = "a".repeat(32);
        let built = build_key(&RawKey::from(key.as_str())).unwrap();
        assert_eq!(built.as_str(), key);
    }

    #[test]
    fn test_structured_key_is_deterministic() {
        let a = build_key(&RawKey::from(json!([1, "x", true]))).unwrap();
        let b = build_key(&RawKey::from(json!([1, "x", true]))).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_distinct_structured_keys_differ() {
        let a = build_key(&RawKey::from(json!([1, "x", true]))).unwrap();
        let b = build_key(&RawKey::from(json!([1, "x", false]))).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_object_member_order_is_significant() {
        // Insertion order is the canonical order; it is not re-sorted.
        let ab = build_key(&RawKey::from(json!({"a": 1, "b": 2}))).unwrap();
        let ba = build_key(&RawKey::from(json!({"b": 2, "a": 1}))).unwrap();
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_integer_keys() {
        let a = build_key(&RawKey::from(42_i64)).unwrap();
        let b = build_key(&RawKey::from(42_u64)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, build_key(&RawKey::from(43_i64)).unwrap());
    }

    #[test]
    fn test_structured_constructor_from_tuple() {
        let key = RawKey::structured(&("profile", 42_u64)).unwrap();
        assert_eq!(key, RawKey::Structured(json!(["profile", 42])));
    }

    #[test]
    fn test_structured_rejects_nan() {
        let result = RawKey::structured(&f64::NAN);
        assert!(matches!(result, Err(CacheError::KeyEncoding { .. })));
    }

    #[test]
    fn test_prefix() {
        let built = build_key(&RawKey::from("user42")).unwrap();
        assert_eq!(built.with_prefix("app1.").as_str(), "app1.user42");
    }
}
