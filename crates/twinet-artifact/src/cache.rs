//! Bounded read cache using moka
//!
//! Entries are keyed by resolved file path and remember the file's
//! modification time and the read options they were materialized with. A
//! lookup only hits when both still match, so external edits are picked up
//! and two descriptors sharing one file never see each other's projection.

use crate::options::FormatOptions;
use crate::value::ArtifactValue;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
    /// Lookups served from memory
    pub hits: u64,
    /// Lookups that had to go to disk
    pub misses: u64,
}

#[derive(Debug, Clone)]
struct CachedArtifact {
    value: Arc<ArtifactValue>,
    modified: Option<SystemTime>,
    options: FormatOptions,
}

/// Path-keyed artifact cache with least-recently-used eviction
///
/// Values handed out are deep copies; callers can never mutate a cached value.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    inner: Cache<PathBuf, CachedArtifact>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl ArtifactCache {
    /// Create new cache holding at most `max_capacity` values
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Store a value read from or written to `path`
    pub fn insert(
        &self,
        path: PathBuf,
        value: ArtifactValue,
        modified: Option<SystemTime>,
        options: FormatOptions,
    ) {
        self.inner.insert(
            path,
            CachedArtifact {
                value: Arc::new(value),
                modified,
                options,
            },
        );
    }

    /// Copy of the cached value if the file still has modification time
    /// `modified` and the entry was read with `options`
    ///
    /// A stale entry is dropped and counted as a miss.
    #[must_use]
    pub fn get_fresh(
        &self,
        path: &Path,
        modified: Option<SystemTime>,
        options: &FormatOptions,
    ) -> Option<ArtifactValue> {
        let found = self.inner.get(path);
        match found {
            Some(entry) if entry.modified.is_some() && entry.modified == modified => {
                if entry.options != *options {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(ArtifactValue::clone(&entry.value))
            }
            Some(_) => {
                self.inner.invalidate(path);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Check if cache holds an entry for path, fresh or not
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.contains_key(path)
    }

    /// Invalidate cache entry
    #[inline]
    pub fn invalidate(&self, path: &Path) {
        self.inner.invalidate(path);
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks();
        CacheStats {
            entry_count: self.inner.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ArtifactCache {
    /// Create cache with default capacity (128 entries)
    fn default() -> Self {
        Self::new(128)
    }
}
