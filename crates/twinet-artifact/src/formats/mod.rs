//! Format drivers for different artifact layouts
//!
//! Provides reading and writing of artifact values:
//! - Tables (csv) via the csv crate
//! - Documents (json, yaml) via serde
//! - Attributed graphs (graph) as node-link JSON

use crate::error::{FormatError, StoreError};
use crate::options::FormatOptions;
use crate::value::{ArtifactKind, ArtifactValue};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

mod delimited;
mod graph;
mod json;
mod yaml;

pub use self::delimited::CsvDriver;
pub use self::graph::GraphDriver;
pub use self::json::JsonDriver;
pub use self::yaml::YamlDriver;

/// What a writer reports after persisting a value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Size of the written file
    pub bytes: u64,
    /// Rows, edges or top-level entries written
    pub records: usize,
}

/// Reader/writer pair for one on-disk layout
///
/// Implement this trait to add support for new artifact formats. Drivers are
/// shared across worker threads and must not hold mutable state.
pub trait FormatDriver: Send + Sync + 'static {
    /// Kind of value this driver stores
    fn kind(&self) -> ArtifactKind;

    /// Decode the file at `path`
    fn read(&self, path: &Path, options: &FormatOptions) -> Result<ArtifactValue, FormatError>;

    /// Encode `value` into the file at `path`, replacing it
    fn write(
        &self,
        value: &ArtifactValue,
        path: &Path,
        options: &FormatOptions,
    ) -> Result<WriteSummary, FormatError>;

    /// Value a default-options `read` returns after `value` was written with `write_options`
    ///
    /// The store caches this after a write, so warm and cold reads agree.
    /// Lossless formats keep the default.
    fn canonicalize(&self, value: ArtifactValue, _write_options: &FormatOptions) -> ArtifactValue {
        value
    }
}

type ReadFn = dyn Fn(&Path, &FormatOptions) -> Result<ArtifactValue, FormatError> + Send + Sync;
type WriteFn =
    dyn Fn(&ArtifactValue, &Path, &FormatOptions) -> Result<WriteSummary, FormatError> + Send + Sync;

/// Driver assembled from a reader and a writer closure
pub struct FnDriver {
    kind: ArtifactKind,
    reader: Box<ReadFn>,
    writer: Box<WriteFn>,
}

impl FnDriver {
    /// Create driver from closures
    pub fn new<R, W>(kind: ArtifactKind, reader: R, writer: W) -> Self
    where
        R: Fn(&Path, &FormatOptions) -> Result<ArtifactValue, FormatError> + Send + Sync + 'static,
        W: Fn(&ArtifactValue, &Path, &FormatOptions) -> Result<WriteSummary, FormatError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            kind,
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

impl FormatDriver for FnDriver {
    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    fn read(&self, path: &Path, options: &FormatOptions) -> Result<ArtifactValue, FormatError> {
        (self.reader)(path, options)
    }

    fn write(
        &self,
        value: &ArtifactValue,
        path: &Path,
        options: &FormatOptions,
    ) -> Result<WriteSummary, FormatError> {
        (self.writer)(value, path, options)
    }
}

/// Tag → driver mapping
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn FormatDriver>>,
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

impl DriverRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            drivers: BTreeMap::new(),
        }
    }

    /// Register a driver under `tag`, replacing any previous one
    pub fn register<D: FormatDriver>(&mut self, tag: impl Into<String>, driver: D) {
        self.register_shared(tag, Arc::new(driver));
    }

    /// Register an already shared driver
    pub fn register_shared(&mut self, tag: impl Into<String>, driver: Arc<dyn FormatDriver>) {
        let tag = tag.into();
        tracing::debug!(tag = %tag, kind = %driver.kind(), "registering format driver");
        self.drivers.insert(tag, driver);
    }

    /// Register a reader/writer closure pair
    pub fn register_fn<R, W>(&mut self, tag: impl Into<String>, kind: ArtifactKind, reader: R, writer: W)
    where
        R: Fn(&Path, &FormatOptions) -> Result<ArtifactValue, FormatError> + Send + Sync + 'static,
        W: Fn(&ArtifactValue, &Path, &FormatOptions) -> Result<WriteSummary, FormatError>
            + Send
            + Sync
            + 'static,
    {
        self.register(tag, FnDriver::new(kind, reader, writer));
    }

    /// Find driver for tag
    ///
    /// # Errors
    /// Returns `StoreError::UnknownFormat` if nothing is registered under `tag`
    pub fn lookup(&self, tag: &str) -> Result<Arc<dyn FormatDriver>, StoreError> {
        self.drivers
            .get(tag)
            .cloned()
            .ok_or_else(|| StoreError::UnknownFormat(tag.to_owned()))
    }

    /// Check if tag is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.drivers.contains_key(tag)
    }

    /// Registered tags, sorted
    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }

    /// Tags with the kind each one stores
    pub fn describe(&self) -> impl Iterator<Item = (&str, ArtifactKind)> {
        self.drivers.iter().map(|(tag, d)| (tag.as_str(), d.kind()))
    }
}

/// Create registry with the built-in drivers
#[must_use]
pub fn default_drivers() -> DriverRegistry {
    let mut registry = DriverRegistry::new();

    // Tables
    registry.register("csv", CsvDriver);

    // Documents
    registry.register("json", JsonDriver);
    registry.register("yaml", YamlDriver);

    // Graphs
    registry.register("graph", GraphDriver);

    registry
}

pub(crate) fn open_file(path: &Path) -> Result<BufReader<File>, FormatError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| FormatError::io_error(path, e))
}

pub(crate) fn create_file(path: &Path) -> Result<BufWriter<File>, FormatError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| FormatError::io_error(path, e))
}

pub(crate) fn file_size(path: &Path) -> Result<u64, FormatError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| FormatError::io_error(path, e))
}

pub(crate) fn wrong_kind(tag: &str, expected: ArtifactKind, value: &ArtifactValue) -> FormatError {
    FormatError::WrongKind {
        tag: tag.to_owned(),
        expected,
        actual: value.kind(),
    }
}
