//! JSON documents
//!
//! Uses serde_json for parsing; documents keep number types. Object keys are
//! held sorted, so a read-then-write emits them in lexical order.
//! Write option `pretty` (default true) selects indented output.

use super::{create_file, file_size, open_file, wrong_kind, FormatDriver, WriteSummary};
use crate::error::FormatError;
use crate::options::FormatOptions;
use crate::value::{ArtifactKind, ArtifactValue, Document};
use std::io::Write;
use std::path::Path;

const TAG: &str = "json";

/// JSON document driver
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDriver;

impl JsonDriver {
    /// Create new JSON driver
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FormatDriver for JsonDriver {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Document
    }

    fn read(&self, path: &Path, _options: &FormatOptions) -> Result<ArtifactValue, FormatError> {
        let document: Document = serde_json::from_reader(open_file(path)?)?;
        Ok(ArtifactValue::Document(document))
    }

    fn write(
        &self,
        value: &ArtifactValue,
        path: &Path,
        options: &FormatOptions,
    ) -> Result<WriteSummary, FormatError> {
        let document = value
            .as_document()
            .ok_or_else(|| wrong_kind(TAG, ArtifactKind::Document, value))?;
        let pretty = options.bool_or("pretty", true)?;

        let mut writer = create_file(path)?;
        if pretty {
            serde_json::to_writer_pretty(&mut writer, document)?;
        } else {
            serde_json::to_writer(&mut writer, document)?;
        }
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .map_err(|e| FormatError::io_error(path, e))?;
        drop(writer);

        Ok(WriteSummary {
            bytes: file_size(path)?,
            records: value.record_count(),
        })
    }
}
