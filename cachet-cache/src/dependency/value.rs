//! Dependency on another cache entry's value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DependencyCheck;
use crate::error::CacheResult;
use crate::facade::Cache;
use crate::key::RawKey;

/// Invalidates when the watched cache entry's value changes.
///
/// The baseline is the watched entry's value at write time (`None` when the
/// entry was absent). Any difference at read time, including the entry
/// appearing or disappearing, reports change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDependency {
    key: RawKey,
    #[serde(default)]
    baseline: Option<Value>,
}

impl ValueDependency {
    /// Watch the entry stored under `key`.
    pub fn new(key: impl Into<RawKey>) -> Self {
        Self {
            key: key.into(),
            baseline: None,
        }
    }

    fn current(&self, cache: &Cache) -> CacheResult<Option<Value>> {
        cache.get(self.key.clone())
    }
}

impl DependencyCheck for ValueDependency {
    fn evaluate(&mut self, cache: &Cache) -> CacheResult<()> {
        self.baseline = self.current(cache)?;
        Ok(())
    }

    fn is_changed(&self, cache: &Cache) -> CacheResult<bool> {
        Ok(self.current(cache)? != self.baseline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_store::MemoryStore;
    use std::sync::Arc;

    fn new_cache() -> Cache {
        Cache::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_unchanged_value_is_not_changed() {
        let cache = new_cache();
        cache.set("watched", &"stable", None, None).unwrap();

        let mut dep = ValueDependency::new("watched");
        dep.evaluate(&cache).unwrap();
        assert!(!dep.is_changed(&cache).unwrap());
    }

    #[test]
    fn test_modified_value_is_changed() {
        let cache = new_cache();
        cache.set("watched", &1, None, None).unwrap();

        let mut dep = ValueDependency::new("watched");
        dep.evaluate(&cache).unwrap();

        cache.set("watched", &2, None, None).unwrap();
        assert!(dep.is_changed(&cache).unwrap());
    }

    #[test]
    fn test_absent_baseline_changes_on_appearance() {
        let cache = new_cache();

        let mut dep = ValueDependency::new("watched");
        dep.evaluate(&cache).unwrap();
        assert!(!dep.is_changed(&cache).unwrap());

        cache.set("watched", &"now present", None, None).unwrap();
        assert!(dep.is_changed(&cache).unwrap());
    }

    #[test]
    fn test_deletion_changes() {
        let cache = new_cache();
        cache.set("watched", &1, None, None).unwrap();

        let mut dep = ValueDependency::new("watched");
        dep.evaluate(&cache).unwrap();

        cache.delete("watched").unwrap();
        assert!(dep.is_changed(&cache).unwrap());
    }
}
