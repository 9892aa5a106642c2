//! Dependency-based invalidation.
//!
//! A dependency is a caller-supplied change detector attached to a cached
//! value at write time. The cache evaluates it once per write (capturing a
//! baseline snapshot) and consults it once per read; a changed dependency
//! turns the read into a miss, independent of the store's TTL.
//!
//! Both operations receive the cache itself, so a dependency may read other
//! cache entries while snapshotting or checking (see [`ValueDependency`]
//! and [`TagDependency`]).

pub mod file;
pub mod tag;
pub mod value;

pub use file::FileDependency;
pub use tag::TagDependency;
pub use value::ValueDependency;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CacheResult;
use crate::facade::Cache;
use crate::key::RawKey;

/// The two-operation protocol the cache drives.
///
/// `evaluate` runs at write time and must capture whatever baseline the
/// dependency compares against later. `is_changed` runs at read time and
/// reports whether the monitored condition has moved since the baseline.
pub trait DependencyCheck {
    /// Capture the baseline snapshot of the monitored condition.
    fn evaluate(&mut self, cache: &Cache) -> CacheResult<()>;

    /// Whether the monitored condition has changed relative to the
    /// baseline captured by [`DependencyCheck::evaluate`].
    fn is_changed(&self, cache: &Cache) -> CacheResult<bool>;
}

/// A serializable dependency attached to a cached value.
///
/// Variants are independent detectors; the composite variants combine
/// members with OR / AND semantics. The whole tree is stored alongside the
/// cached value and rebuilt on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dependency {
    /// Invalidates when another cache entry's value changes.
    Value(ValueDependency),
    /// Invalidates when any associated tag is bumped.
    Tag(TagDependency),
    /// Invalidates when a file's modification time changes.
    File(FileDependency),
    /// Changed when ANY member reports change.
    AnyChanged { members: Vec<Dependency> },
    /// Changed only when EVERY member reports change.
    AllChanged { members: Vec<Dependency> },
}

impl Dependency {
    /// Watch another cache entry.
    pub fn value(key: impl Into<RawKey>) -> Self {
        Self::Value(ValueDependency::new(key))
    }

    /// Associate with a single tag.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(TagDependency::new([tag.into()]))
    }

    /// Associate with several tags; any one being bumped invalidates.
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Tag(TagDependency::new(tags))
    }

    /// Watch a file's modification time.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(FileDependency::new(path))
    }

    /// OR-composite over `members`.
    pub fn any_changed(members: Vec<Dependency>) -> Self {
        Self::AnyChanged { members }
    }

    /// AND-composite over `members`.
    pub fn all_changed(members: Vec<Dependency>) -> Self {
        Self::AllChanged { members }
    }
}

impl DependencyCheck for Dependency {
    fn evaluate(&mut self, cache: &Cache) -> CacheResult<()> {
        match self {
            Self::Value(d) => d.evaluate(cache),
            Self::Tag(d) => d.evaluate(cache),
            Self::File(d) => d.evaluate(cache),
            Self::AnyChanged { members } | Self::AllChanged { members } => {
                for member in members {
                    member.evaluate(cache)?;
                }
                Ok(())
            }
        }
    }

    fn is_changed(&self, cache: &Cache) -> CacheResult<bool> {
        match self {
            Self::Value(d) => d.is_changed(cache),
            Self::Tag(d) => d.is_changed(cache),
            Self::File(d) => d.is_changed(cache),
            Self::AnyChanged { members } => {
                for member in members {
                    if member.is_changed(cache)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::AllChanged { members } => {
                if members.is_empty() {
                    return Ok(false);
                }
                for member in members {
                    if !member.is_changed(cache)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}
