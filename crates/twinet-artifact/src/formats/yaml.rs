//! YAML documents
//!
//! Parsed with serde_yaml into the same document model as JSON, so keys must be
//! strings. Only single-document files are supported.

use super::{create_file, file_size, open_file, wrong_kind, FormatDriver, WriteSummary};
use crate::error::FormatError;
use crate::options::FormatOptions;
use crate::value::{ArtifactKind, ArtifactValue, Document};
use std::io::Write;
use std::path::Path;

const TAG: &str = "yaml";

/// YAML document driver
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlDriver;

impl YamlDriver {
    /// Create new YAML driver
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FormatDriver for YamlDriver {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Document
    }

    fn read(&self, path: &Path, _options: &FormatOptions) -> Result<ArtifactValue, FormatError> {
        let document: Document = serde_yaml::from_reader(open_file(path)?)?;
        Ok(ArtifactValue::Document(document))
    }

    fn write(
        &self,
        value: &ArtifactValue,
        path: &Path,
        _options: &FormatOptions,
    ) -> Result<WriteSummary, FormatError> {
        let document = value
            .as_document()
            .ok_or_else(|| wrong_kind(TAG, ArtifactKind::Document, value))?;

        let mut writer = create_file(path)?;
        serde_yaml::to_writer(&mut writer, document)?;
        writer.flush().map_err(|e| FormatError::io_error(path, e))?;
        drop(writer);

        Ok(WriteSummary {
            bytes: file_size(path)?,
            records: value.record_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.yaml");
        let value = ArtifactValue::Document(json!({
            "threshold": 0.5,
            "labels": ["a", "b"],
            "nested": {"enabled": true}
        }));

        YamlDriver.write(&value, &path, &FormatOptions::new()).unwrap();
        assert_eq!(YamlDriver.read(&path, &FormatOptions::new()).unwrap(), value);
    }

    #[test]
    fn reads_hand_written_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.yaml");
        std::fs::write(&path, "name: test\nitems:\n  - one\n  - two\n").unwrap();

        let value = YamlDriver.read(&path, &FormatOptions::new()).unwrap();
        let doc = value.as_document().unwrap();
        assert_eq!(doc["name"], "test");
        assert_eq!(doc["items"][1], "two");
    }

    #[test]
    fn invalid_yaml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "key: [unclosed").unwrap();
        assert!(matches!(
            YamlDriver.read(&path, &FormatOptions::new()),
            Err(FormatError::Yaml(_))
        ));
    }

    #[test]
    fn rejects_tables() {
        let dir = tempfile::tempdir().unwrap();
        let err = YamlDriver
            .write(
                &ArtifactValue::Table(crate::value::Table::default()),
                &dir.path().join("t.yaml"),
                &FormatOptions::new(),
            )
            .unwrap_err();
        assert!(matches!(err, FormatError::WrongKind { .. }));
    }
}
