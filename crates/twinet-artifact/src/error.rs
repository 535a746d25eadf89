//! Error types for the artifact store
//!
//! Provides error handling for:
//! - Value construction (tables and graphs)
//! - Format drivers (file → value, value → file)
//! - Store operations (declaration, lookup, read, write)

use crate::key::ArtifactKey;
use crate::value::ArtifactKind;
use std::path::PathBuf;

/// Errors raised while building in-memory artifact values
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// Row length does not match the table's column count
    #[error("row has {actual} cells, table has {expected} columns")]
    ArityMismatch { expected: usize, actual: usize },

    /// Column name not present in the table
    #[error("unknown column: '{0}'")]
    UnknownColumn(String),

    /// Column index outside the table
    #[error("column index {index} out of range for {width} columns")]
    ColumnOutOfRange { index: usize, width: usize },

    /// Row index outside the table
    #[error("row index {index} out of range for {len} rows")]
    RowOutOfRange { index: usize, len: usize },

    /// Edge references a node id that was never declared
    #[error("edge references unknown node: '{0}'")]
    UnknownNode(String),
}

/// Errors raised by format drivers
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// IO error while touching the backing file
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tabular encoding error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Read or write option has an unusable value
    #[error("invalid option '{name}': {message}")]
    InvalidOption { name: String, message: String },

    /// Driver was handed a value of a kind it does not store
    #[error("'{tag}' driver stores {expected} values, got {actual}")]
    WrongKind {
        tag: String,
        expected: ArtifactKind,
        actual: ArtifactKind,
    },

    /// File content parsed but does not describe a valid value
    #[error("malformed content: {0}")]
    Malformed(String),

    /// Decoded content violates a value invariant
    #[error("invalid value: {0}")]
    Value(#[from] ValueError),
}

impl FormatError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create invalid option error
    pub fn invalid_option(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether the underlying cause is a missing file
    #[must_use]
    pub fn is_missing_file(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            Self::Csv(e) => matches!(e.kind(), csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound),
            _ => false,
        }
    }
}

/// Errors raised by the artifact store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Format tag has no registered driver
    #[error("no format driver registered for tag '{0}'")]
    UnknownFormat(String),

    /// Key used without a prior declaration
    #[error("artifact {0} was never declared")]
    UndeclaredArtifact(ArtifactKey),

    /// Backing file is absent
    #[error("artifact {key} not found at {}", path.display())]
    NotFound { key: ArtifactKey, path: PathBuf },

    /// Stored value is not of the requested kind
    #[error("artifact {key} holds a {actual} value, expected {expected}")]
    KindMismatch {
        key: ArtifactKey,
        expected: ArtifactKind,
        actual: ArtifactKind,
    },

    /// Driver failed to read or write the artifact
    #[error("format error for {key}: {source}")]
    Format {
        key: ArtifactKey,
        #[source]
        source: FormatError,
    },

    /// Store-level filesystem failure (directory creation, removal, stat)
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Configuration and programming faults are never worth another attempt
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::UnknownFormat(_) | Self::UndeclaredArtifact(_))
    }

    /// Check if error reports an absent artifact
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_display() {
        let err = StoreError::UnknownFormat("parquet".to_string());
        assert_eq!(err.to_string(), "no format driver registered for tag 'parquet'");
    }

    #[test]
    fn configuration_faults_are_not_retryable() {
        let key = ArtifactKey::new("p", "s", "edges.csv");
        assert!(!StoreError::UnknownFormat("x".into()).is_retryable());
        assert!(!StoreError::UndeclaredArtifact(key.clone()).is_retryable());
        assert!(StoreError::NotFound {
            key,
            path: PathBuf::from("p/s/edges.csv"),
        }
        .is_retryable());
    }

    #[test]
    fn format_error_detects_missing_file() {
        let err = FormatError::io_error(
            "missing.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_missing_file());
        assert!(!FormatError::Malformed("x".into()).is_missing_file());
    }

    #[test]
    fn value_error_converts_into_format_error() {
        let err: FormatError = ValueError::UnknownColumn("weight".into()).into();
        assert!(matches!(err, FormatError::Value(ValueError::UnknownColumn(_))));
        assert_eq!(err.to_string(), "invalid value: unknown column: 'weight'");
    }
}
