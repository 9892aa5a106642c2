//! Dependency on a file's modification time.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DependencyCheck;
use crate::error::{CacheError, CacheResult};
use crate::facade::Cache;

/// Invalidates when the file's modification time differs from the snapshot
/// taken at write time. A missing file snapshots as `None`, so creation and
/// deletion both count as change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDependency {
    path: PathBuf,
    #[serde(default)]
    modified: Option<DateTime<Utc>>,
}

impl FileDependency {
    /// Watch the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            modified: None,
        }
    }

    fn probe(path: &Path) -> CacheResult<Option<DateTime<Utc>>> {
        match std::fs::metadata(path) {
            Ok(meta) => {
                let modified = meta.modified().map_err(|e| CacheError::Dependency {
                    reason: format!("cannot read mtime of {}: {e}", path.display()),
                })?;
                Ok(Some(DateTime::<Utc>::from(modified)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Dependency {
                reason: format!("cannot stat {}: {e}", path.display()),
            }),
        }
    }
}

impl DependencyCheck for FileDependency {
    fn evaluate(&mut self, _cache: &Cache) -> CacheResult<()> {
        self.modified = Self::probe(&self.path)?;
        Ok(())
    }

    fn is_changed(&self, _cache: &Cache) -> CacheResult<bool> {
        Ok(Self::probe(&self.path)? != self.modified)
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
    fn test_untouched_file_is_not_changed() {
        let cache = new_cache();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "a = 1").unwrap();

        let mut dep = FileDependency::new(&path);
        dep.evaluate(&cache).unwrap();
        assert!(!dep.is_changed(&cache).unwrap());
    }

    #[test]
    fn test_deleted_file_is_changed() {
        let cache = new_cache();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "a = 1").unwrap();

        let mut dep = FileDependency::new(&path);
        dep.evaluate(&cache).unwrap();

        std::fs::remove_file(&path).unwrap();
        assert!(dep.is_changed(&cache).unwrap());
    }

    #[test]
    fn test_created_file_is_changed() {
        let cache = new_cache();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appears-later.txt");

        let mut dep = FileDependency::new(&path);
        dep.evaluate(&cache).unwrap();
        assert!(!dep.is_changed(&cache).unwrap());

        std::fs::write(&path, "here now").unwrap();
        assert!(dep.is_changed(&cache).unwrap());
    }
}
