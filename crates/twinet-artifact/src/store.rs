//! Artifact Store - the only component that touches pipeline files
//!
//! Maps declared keys to paths and drivers, answers existence queries, and
//! reads/writes through the matching driver with a bounded read cache.
//!
//! # Concurrency
//! The store is `Send + Sync` and meant to be shared through an `Arc`. The
//! descriptor map and the cache synchronize internally; concurrent writes to
//! distinct keys never interfere. Two writers racing on the same key is a
//! pipeline authoring error and is not guarded against. Writes go through a
//! sibling temp file and a rename, so readers never observe a partial file.

use crate::cache::{ArtifactCache, CacheStats};
use crate::error::{StoreError, StoreResult};
use crate::formats::{default_drivers, DriverRegistry, WriteSummary};
use crate::key::{ArtifactDescriptor, ArtifactKey, ArtifactSpec};
use crate::options::FormatOptions;
use crate::value::{ArtifactKind, ArtifactValue, AttrGraph, Document, Table};
use dashmap::DashMap;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Default number of cached artifact values
pub const DEFAULT_CACHE_CAPACITY: u64 = 64;

/// Declared artifacts rooted at one directory
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    drivers: DriverRegistry,
    descriptors: DashMap<ArtifactKey, Arc<ArtifactDescriptor>>,
    cache: ArtifactCache,
}

impl ArtifactStore {
    /// Create store with the built-in drivers and default cache capacity
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_capacity(root, DEFAULT_CACHE_CAPACITY)
    }

    /// Create store with specific cache capacity
    #[must_use]
    pub fn with_capacity(root: impl Into<PathBuf>, cache_capacity: u64) -> Self {
        Self::with_drivers(root, default_drivers(), cache_capacity)
    }

    /// Create store with a custom driver registry
    #[must_use]
    pub fn with_drivers(
        root: impl Into<PathBuf>,
        drivers: DriverRegistry,
        cache_capacity: u64,
    ) -> Self {
        Self {
            root: root.into(),
            drivers,
            descriptors: DashMap::new(),
            cache: ArtifactCache::new(cache_capacity),
        }
    }

    /// Root directory of all default artifact locations
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registered format drivers
    #[inline]
    #[must_use]
    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// Register artifact declarations, replacing earlier ones with the same key
    ///
    /// Every spec is resolved before any is registered, so a failing batch
    /// leaves the store unchanged.
    ///
    /// # Errors
    /// Returns `StoreError::UnknownFormat` if a spec names an unregistered tag
    pub fn declare<I>(&self, specs: I) -> StoreResult<Vec<ArtifactKey>>
    where
        I: IntoIterator<Item = ArtifactSpec>,
    {
        let resolved = specs
            .into_iter()
            .map(|spec| {
                let driver = self.drivers.lookup(&spec.format_tag)?;
                Ok(ArtifactDescriptor::resolve(spec, &self.root, driver))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(resolved
            .into_iter()
            .map(|descriptor| self.register(descriptor))
            .collect())
    }

    /// Declare a single artifact
    ///
    /// # Errors
    /// Returns `StoreError::UnknownFormat` if `spec` names an unregistered tag
    pub fn declare_one(&self, spec: ArtifactSpec) -> StoreResult<ArtifactKey> {
        let driver = self.drivers.lookup(&spec.format_tag)?;
        Ok(self.register(ArtifactDescriptor::resolve(spec, &self.root, driver)))
    }

    fn register(&self, descriptor: ArtifactDescriptor) -> ArtifactKey {
        let key = descriptor.key.clone();
        let path = descriptor.path.clone();
        if let Some(previous) = self.descriptors.insert(key.clone(), Arc::new(descriptor)) {
            tracing::debug!(key = %key, previous = %previous.path.display(), "artifact redeclared");
            self.cache.invalidate(&previous.path);
        } else {
            tracing::debug!(key = %key, path = %path.display(), "artifact declared");
        }
        key
    }

    /// Resolved descriptor for a key
    ///
    /// # Errors
    /// Returns `StoreError::UndeclaredArtifact` if the key was never declared
    pub fn descriptor(&self, key: &ArtifactKey) -> StoreResult<Arc<ArtifactDescriptor>> {
        self.descriptors
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::UndeclaredArtifact(key.clone()))
    }

    /// All declared keys, sorted
    #[must_use]
    pub fn declared_keys(&self) -> Vec<ArtifactKey> {
        let mut keys: Vec<_> = self.descriptors.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Check if the backing file of a declared artifact exists
    ///
    /// Presence is all that is checked: a file left by an older pipeline
    /// version counts as current. Rerun into a clean root after changing an
    /// artifact's shape.
    ///
    /// # Errors
    /// - `StoreError::UndeclaredArtifact` if the key was never declared
    /// - `StoreError::Io` if existence cannot be determined
    pub fn exists(&self, key: &ArtifactKey) -> StoreResult<bool> {
        let descriptor = self.descriptor(key)?;
        descriptor
            .path
            .try_exists()
            .map_err(|e| StoreError::io_error(&descriptor.path, e))
    }

    /// Check if every listed artifact exists
    ///
    /// # Errors
    /// Same as [`ArtifactStore::exists`], for the first failing key
    pub fn exists_all<'a, I>(&self, keys: I) -> StoreResult<bool>
    where
        I: IntoIterator<Item = &'a ArtifactKey>,
    {
        for key in keys {
            if !self.exists(key)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Read an artifact, serving fresh cache entries from memory
    ///
    /// The returned value is an owned copy; mutating it never affects the cache.
    ///
    /// # Errors
    /// - `StoreError::UndeclaredArtifact` if the key was never declared
    /// - `StoreError::NotFound` if the backing file does not exist
    /// - `StoreError::Format` if the driver cannot decode the file
    pub fn read(&self, key: &ArtifactKey) -> StoreResult<ArtifactValue> {
        let descriptor = self.descriptor(key)?;
        let path = descriptor.path();

        let Some(modified) = self.modified(&descriptor)? else {
            self.cache.invalidate(path);
            return Err(not_found(&descriptor));
        };

        if let Some(value) = self.cache.get_fresh(path, modified, &descriptor.read_options) {
            tracing::debug!(key = %key, "cache hit");
            return Ok(value);
        }
        tracing::debug!(key = %key, path = %path.display(), "cache miss, reading from disk");

        let value = descriptor
            .driver
            .read(path, &descriptor.read_options)
            .map_err(|source| {
                if source.is_missing_file() {
                    not_found(&descriptor)
                } else {
                    StoreError::Format {
                        key: key.clone(),
                        source,
                    }
                }
            })?;

        self.cache.insert(
            path.to_path_buf(),
            value.clone(),
            modified,
            descriptor.read_options.clone(),
        );
        Ok(value)
    }

    /// Read an artifact, mapping an absent file to `None`
    ///
    /// # Errors
    /// Same as [`ArtifactStore::read`], except for `NotFound`
    pub fn read_optional(&self, key: &ArtifactKey) -> StoreResult<Option<ArtifactValue>> {
        match self.read(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read an artifact that must hold a table
    ///
    /// # Errors
    /// Same as [`ArtifactStore::read`], plus `StoreError::KindMismatch`
    pub fn read_table(&self, key: &ArtifactKey) -> StoreResult<Table> {
        match self.read(key)? {
            ArtifactValue::Table(table) => Ok(table),
            other => Err(kind_mismatch(key, ArtifactKind::Table, &other)),
        }
    }

    /// Read an artifact that must hold a document
    ///
    /// # Errors
    /// Same as [`ArtifactStore::read`], plus `StoreError::KindMismatch`
    pub fn read_document(&self, key: &ArtifactKey) -> StoreResult<Document> {
        match self.read(key)? {
            ArtifactValue::Document(document) => Ok(document),
            other => Err(kind_mismatch(key, ArtifactKind::Document, &other)),
        }
    }

    /// Read an artifact that must hold a graph
    ///
    /// # Errors
    /// Same as [`ArtifactStore::read`], plus `StoreError::KindMismatch`
    pub fn read_graph(&self, key: &ArtifactKey) -> StoreResult<AttrGraph> {
        match self.read(key)? {
            ArtifactValue::Graph(graph) => Ok(graph),
            other => Err(kind_mismatch(key, ArtifactKind::Graph, &other)),
        }
    }

    /// Persist a value, creating the directory first and refreshing the cache
    ///
    /// The driver writes a hidden temp file next to the target, which is then
    /// renamed over it. A failed write leaves any previous file untouched and
    /// no partial file behind.
    ///
    /// The cache receives the value as a later read will decode it, so cached
    /// and cold reads agree even for lossy formats. The value is moved into
    /// the cache; later changes by the caller cannot reach the cached copy.
    ///
    /// # Errors
    /// - `StoreError::UndeclaredArtifact` if the key was never declared
    /// - `StoreError::Io` if the directory or temp file cannot be created, or the rename fails
    /// - `StoreError::Format` if the driver rejects the value or fails to write
    pub fn write(&self, key: &ArtifactKey, value: impl Into<ArtifactValue>) -> StoreResult<WriteSummary> {
        let value = value.into();
        let descriptor = self.descriptor(key)?;
        let path = descriptor.path();

        std::fs::create_dir_all(&descriptor.directory)
            .map_err(|e| StoreError::io_error(&descriptor.directory, e))?;

        let staged = tempfile::Builder::new()
            .prefix(".twinet-")
            .suffix(".tmp")
            .make_in(&descriptor.directory, |candidate| {
                OpenOptions::new().write(true).create_new(true).open(candidate)
            })
            .map_err(|e| StoreError::io_error(&descriptor.directory, e))?
            .into_temp_path();

        let summary = descriptor
            .driver
            .write(&value, &staged, &descriptor.write_options)
            .map_err(|source| {
                self.cache.invalidate(path);
                StoreError::Format {
                    key: key.clone(),
                    source,
                }
            })?;

        staged.persist(path).map_err(|e| {
            self.cache.invalidate(path);
            StoreError::io_error(path, e.error)
        })?;

        let modified = self.modified(&descriptor)?.flatten();
        let cached = descriptor
            .driver
            .canonicalize(value, &descriptor.write_options);
        self.cache
            .insert(path.to_path_buf(), cached, modified, FormatOptions::new());

        tracing::debug!(
            key = %key,
            path = %path.display(),
            bytes = summary.bytes,
            records = summary.records,
            "artifact written"
        );
        Ok(summary)
    }

    /// Delete the backing file and its cache entry; a missing file is fine
    ///
    /// # Errors
    /// - `StoreError::UndeclaredArtifact` if the key was never declared
    /// - `StoreError::Io` if the file exists but cannot be removed
    pub fn remove(&self, key: &ArtifactKey) -> StoreResult<bool> {
        let descriptor = self.descriptor(key)?;
        self.cache.invalidate(descriptor.path());
        match std::fs::remove_file(descriptor.path()) {
            Ok(()) => {
                tracing::debug!(key = %key, "artifact removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io_error(descriptor.path(), e)),
        }
    }

    /// Drop the cache entry of an artifact
    ///
    /// # Errors
    /// Returns `StoreError::UndeclaredArtifact` if the key was never declared
    pub fn invalidate(&self, key: &ArtifactKey) -> StoreResult<()> {
        let descriptor = self.descriptor(key)?;
        self.cache.invalidate(descriptor.path());
        Ok(())
    }

    /// Drop every cache entry
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Cache statistics
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Modification time of the backing file
    ///
    /// `None` when the file is absent, `Some(None)` when the platform cannot
    /// report a timestamp.
    #[allow(clippy::option_option)]
    fn modified(&self, descriptor: &ArtifactDescriptor) -> StoreResult<Option<Option<SystemTime>>> {
        match std::fs::metadata(&descriptor.path) {
            Ok(meta) => Ok(Some(meta.modified().ok())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io_error(&descriptor.path, e)),
        }
    }
}

fn not_found(descriptor: &ArtifactDescriptor) -> StoreError {
    StoreError::NotFound {
        key: descriptor.key.clone(),
        path: descriptor.path.clone(),
    }
}

fn kind_mismatch(key: &ArtifactKey, expected: ArtifactKind, value: &ArtifactValue) -> StoreError {
    StoreError::KindMismatch {
        key: key.clone(),
        expected,
        actual: value.kind(),
    }
}
