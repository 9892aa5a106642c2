//! Tag-based invalidation.
//!
//! Every tag owns a version marker stored in the cache itself under a
//! reserved structured key. A write with a `TagDependency` snapshots the
//! current marker of each tag (creating markers on first use);
//! [`TagDependency::invalidate`] replaces the markers, which flips
//! `is_changed` for every entry that captured the old ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DependencyCheck;
use crate::error::CacheResult;
use crate::facade::Cache;
use crate::key::RawKey;

/// Namespace component of the structured keys holding tag versions.
const TAG_NAMESPACE: &str = "cachet.tag";

/// Invalidates when any associated tag's version marker is bumped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDependency {
    tags: Vec<String>,
    #[serde(default)]
    versions: BTreeMap<String, String>,
}

impl TagDependency {
    /// Associate with the given tags.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            versions: BTreeMap::new(),
        }
    }

    /// Bump the version markers of `tags`, invalidating every cached entry
    /// whose dependency captured the old markers.
    ///
    /// Returns `false` when the store rejected any marker write.
    pub fn invalidate<I, S>(cache: &Cache, tags: I) -> CacheResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stored = true;
        for tag in tags {
            stored &= Self::write_fresh_version(cache, tag.as_ref())?.is_some();
        }
        Ok(stored)
    }

    fn version_key(tag: &str) -> RawKey {
        RawKey::Structured(serde_json::json!([TAG_NAMESPACE, tag]))
    }

    /// Store a new random marker for `tag`; `None` when the store refused
    /// the write.
    fn write_fresh_version(cache: &Cache, tag: &str) -> CacheResult<Option<String>> {
        let fresh = Uuid::new_v4().to_string();
        let stored = cache.set(Self::version_key(tag), &fresh, None, None)?;
        Ok(stored.then_some(fresh))
    }

    fn current_version(cache: &Cache, tag: &str) -> CacheResult<Option<String>> {
        cache.get(Self::version_key(tag))
    }
}

impl DependencyCheck for TagDependency {
    fn evaluate(&mut self, cache: &Cache) -> CacheResult<()> {
        self.versions.clear();
        for tag in &self.tags {
            let version = match Self::current_version(cache, tag)? {
                Some(version) => Some(version),
                // First use of this tag: mint its marker so later reads
                // can compare against something stable.
                None => Self::write_fresh_version(cache, tag)?,
            };
            if let Some(version) = version {
                self.versions.insert(tag.clone(), version);
            }
        }
        Ok(())
    }

    fn is_changed(&self, cache: &Cache) -> CacheResult<bool> {
        for tag in &self.tags {
            let Some(snapshot) = self.versions.get(tag) else {
                return Ok(true);
            };
            if Self::current_version(cache, tag)?.as_deref() != Some(snapshot) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Dependency;
    use cachet_store::MemoryStore;
    use std::sync::Arc;

    fn new_cache() -> Cache {
        Cache::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_untouched_tag_is_not_changed() {
        let cache = new_cache();
        let mut dep = TagDependency::new(["news"]);
        dep.evaluate(&cache).unwrap();
        assert!(!dep.is_changed(&cache).unwrap());
    }

    #[test]
    fn test_invalidate_changes_dependents() {
        let cache = new_cache();
        let mut dep = TagDependency::new(["news"]);
        dep.evaluate(&cache).unwrap();

        assert!(TagDependency::invalidate(&cache, ["news"]).unwrap());
        assert!(dep.is_changed(&cache).unwrap());
    }

    #[test]
    fn test_any_associated_tag_invalidates() {
        let cache = new_cache();
        let mut dep = TagDependency::new(["news", "users"]);
        dep.evaluate(&cache).unwrap();

        TagDependency::invalidate(&cache, ["users"]).unwrap();
        assert!(dep.is_changed(&cache).unwrap());
    }

    #[test]
    fn test_unrelated_tag_does_not_invalidate() {
        let cache = new_cache();
        let mut dep = TagDependency::new(["news"]);
        dep.evaluate(&cache).unwrap();

        TagDependency::invalidate(&cache, ["users"]).unwrap();
        assert!(!dep.is_changed(&cache).unwrap());
    }

    #[test]
    fn test_end_to_end_through_cache() {
        let cache = new_cache();
        cache
            .set("front", &"rendered page", None, Some(Dependency::tag("news")))
            .unwrap();
        assert_eq!(cache.get::<String>("front").unwrap().as_deref(), Some("rendered page"));

        TagDependency::invalidate(&cache, ["news"]).unwrap();
        assert_eq!(cache.get::<String>("front").unwrap(), None);
    }
}
