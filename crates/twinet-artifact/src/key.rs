//! Artifact keys, declarations and resolved descriptors
//!
//! An [`ArtifactSpec`] is what a pipeline declares; the store resolves it into
//! an [`ArtifactDescriptor`] bound to an [`ArtifactKey`].

use crate::formats::FormatDriver;
use crate::options::FormatOptions;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Separator between prefix, base name and suffix in a full artifact name
pub const NAME_SEPARATOR: &str = "__";

/// Identity of one artifact: `(pipeline, stage, full_name)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pipeline: String,
    stage: String,
    name: String,
}

impl ArtifactKey {
    /// Create key from an already composed full name
    #[inline]
    #[must_use]
    pub fn new(
        pipeline: impl Into<String>,
        stage: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            stage: stage.into(),
            name: name.into(),
        }
    }

    /// Pipeline name
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Stage name
    #[inline]
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Full artifact name, e.g. `ds1__edges.csv`
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.pipeline, self.stage, self.name)
    }
}

/// Compose the full logical name of an artifact
///
/// Present parts are joined with `__`; empty prefixes and suffixes count as
/// absent.
///
/// # Examples
/// - `("edges", "csv", None, None)` → `edges.csv`
/// - `("edges", "csv", Some("ds1"), None)` → `ds1__edges.csv`
/// - `("edges", "csv", Some("ds1"), Some("v2"))` → `ds1__edges__v2.csv`
#[must_use]
pub fn full_name(
    base_name: &str,
    format_tag: &str,
    prefix: Option<&str>,
    suffix: Option<&str>,
) -> String {
    let stem = [prefix, Some(base_name), suffix]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(NAME_SEPARATOR);
    format!("{stem}.{format_tag}")
}

/// Declaration of one artifact a pipeline stage reads or produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub pipeline: String,
    pub stage: String,
    pub base_name: String,
    pub format_tag: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub read_options: FormatOptions,
    #[serde(default)]
    pub write_options: FormatOptions,
    /// Overrides `<root>/<pipeline>/<stage>`; relative paths resolve against the store root
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl ArtifactSpec {
    /// Create spec without prefix, suffix or options
    #[must_use]
    pub fn new(
        pipeline: impl Into<String>,
        stage: impl Into<String>,
        base_name: impl Into<String>,
        format_tag: impl Into<String>,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            stage: stage.into(),
            base_name: base_name.into(),
            format_tag: format_tag.into(),
            prefix: None,
            suffix: None,
            read_options: FormatOptions::new(),
            write_options: FormatOptions::new(),
            directory: None,
        }
    }

    /// With name prefix (usually a dataset identifier)
    #[inline]
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// With name suffix
    #[inline]
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// With driver read options
    #[inline]
    #[must_use]
    pub fn with_read_options(mut self, options: FormatOptions) -> Self {
        self.read_options = options;
        self
    }

    /// With driver write options
    #[inline]
    #[must_use]
    pub fn with_write_options(mut self, options: FormatOptions) -> Self {
        self.write_options = options;
        self
    }

    /// Store the artifact in an explicit directory
    #[inline]
    #[must_use]
    pub fn in_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Full logical name
    #[must_use]
    pub fn full_name(&self) -> String {
        full_name(
            &self.base_name,
            &self.format_tag,
            self.prefix.as_deref(),
            self.suffix.as_deref(),
        )
    }

    /// Key this spec resolves to
    #[must_use]
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(&self.pipeline, &self.stage, self.full_name())
    }

    /// Directory the artifact lives in under `root`
    #[must_use]
    pub fn resolve_directory(&self, root: &Path) -> PathBuf {
        match &self.directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => root.join(&self.pipeline).join(&self.stage),
        }
    }
}

/// Resolved, immutable record bound to a declared key
#[derive(Clone)]
pub struct ArtifactDescriptor {
    pub(crate) key: ArtifactKey,
    pub(crate) directory: PathBuf,
    pub(crate) path: PathBuf,
    pub(crate) format_tag: String,
    pub(crate) read_options: FormatOptions,
    pub(crate) write_options: FormatOptions,
    pub(crate) driver: Arc<dyn FormatDriver>,
}

impl ArtifactDescriptor {
    /// Bind a spec to its resolved driver
    pub(crate) fn resolve(spec: ArtifactSpec, root: &Path, driver: Arc<dyn FormatDriver>) -> Self {
        let directory = spec.resolve_directory(root);
        let key = spec.key();
        let path = directory.join(key.name());
        Self {
            key,
            directory,
            path,
            format_tag: spec.format_tag,
            read_options: spec.read_options,
            write_options: spec.write_options,
            driver,
        }
    }

    /// Key this descriptor is bound to
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    /// Backing file path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the backing file
    #[inline]
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Format tag
    #[inline]
    #[must_use]
    pub fn format_tag(&self) -> &str {
        &self.format_tag
    }

    /// Options passed to the reader
    #[inline]
    #[must_use]
    pub fn read_options(&self) -> &FormatOptions {
        &self.read_options
    }

    /// Options passed to the writer
    #[inline]
    #[must_use]
    pub fn write_options(&self) -> &FormatOptions {
        &self.write_options
    }
}

impl fmt::Debug for ArtifactDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactDescriptor")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("format_tag", &self.format_tag)
            .field("read_options", &self.read_options)
            .field("write_options", &self.write_options)
            .finish_non_exhaustive()
    }
}
