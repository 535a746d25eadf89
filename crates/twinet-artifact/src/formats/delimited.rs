//! Delimited text tables
//!
//! Read options: `delimiter`, `dtypes`, `usecols`, `index_col`.
//! Write options: `delimiter`, `index`.
//!
//! Column types are inferred from the text unless `dtypes` names them. When
//! inference would not give a column back its written type, the header
//! carries it as `name:type` (`code:str` for a column of `"007"` strings).
//! Empty strings and nulls share the empty field and both read back as null.

use super::{create_file, file_size, open_file, wrong_kind, FormatDriver, WriteSummary};
use crate::error::FormatError;
use crate::options::FormatOptions;
use crate::value::{ArtifactKind, ArtifactValue, Cell, ColumnType, Table};
use ::csv::StringRecord;
use std::collections::BTreeMap;
use std::path::Path;

const TAG: &str = "csv";

/// Comma-separated table driver
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDriver;

impl CsvDriver {
    /// Create new csv driver
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Split a `name:type` header into its parts
fn split_annotation(header: &str) -> Option<(&str, ColumnType)> {
    let (name, ty) = header.rsplit_once(':')?;
    ty.parse().ok().map(|ty| (name, ty))
}

/// Type shared by every non-null cell, if there is one
fn uniform_type<'a>(cells: impl Iterator<Item = &'a Cell>) -> Option<ColumnType> {
    let mut types = cells.filter_map(Cell::column_type);
    let first = types.next()?;
    types.all(|ty| ty == first).then_some(first)
}

/// Header and records exactly as they land on disk
fn render(table: &Table, with_index: bool) -> (StringRecord, Vec<StringRecord>) {
    let fields: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();

    let names = table.columns().iter().enumerate().map(|(idx, name)| {
        let declared = uniform_type(table.rows().iter().map(|row| &row[idx]));
        let inferred = ColumnType::infer(fields.iter().map(move |row| row[idx].as_str()));
        let annotate =
            declared.is_some_and(|ty| ty != inferred) || split_annotation(name).is_some();
        if annotate {
            format!("{name}:{}", declared.unwrap_or(inferred))
        } else {
            name.clone()
        }
    });
    let header: StringRecord = with_index.then(String::new).into_iter().chain(names).collect();

    let records: Vec<StringRecord> = fields
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            with_index
                .then(|| i.to_string())
                .into_iter()
                .chain(row)
                .collect::<StringRecord>()
        })
        .collect();
    (header, records)
}

fn column_types(
    names: &[String],
    annotations: &[Option<ColumnType>],
    records: &[StringRecord],
    dtypes: &BTreeMap<String, String>,
) -> Result<Vec<ColumnType>, FormatError> {
    names
        .iter()
        .zip(annotations)
        .enumerate()
        .map(|(idx, (name, annotated))| match (dtypes.get(name), annotated) {
            (Some(declared), _) => declared
                .parse::<ColumnType>()
                .map_err(|message| FormatError::invalid_option("dtypes", message)),
            (None, Some(ty)) => Ok(*ty),
            (None, None) => Ok(ColumnType::infer(
                records.iter().map(move |r| r.get(idx).unwrap_or_default()),
            )),
        })
        .collect()
}

fn parse_cell(field: &str, ty: ColumnType, column: &str, line: usize) -> Result<Cell, FormatError> {
    if field.is_empty() {
        return Ok(Cell::Null);
    }
    ty.parse(field).ok_or_else(|| {
        FormatError::Malformed(format!(
            "row {line}, column '{column}': cannot parse '{field}' as {ty}"
        ))
    })
}

/// Build a table from raw records under the read options
fn decode(
    header: &StringRecord,
    records: &[StringRecord],
    options: &FormatOptions,
) -> Result<Table, FormatError> {
    let dtypes = options.string_map("dtypes")?;
    let usecols = options.string_list("usecols")?;
    let index_col = options.usize("index_col")?;

    let (names, annotations): (Vec<String>, Vec<Option<ColumnType>>) = header
        .iter()
        .map(|field| match split_annotation(field) {
            Some((name, ty)) => (name.to_owned(), Some(ty)),
            None => (field.to_owned(), None),
        })
        .unzip();
    let types = column_types(&names, &annotations, records, &dtypes)?;

    let mut table = Table::new(names.iter().cloned());
    for (line, record) in records.iter().enumerate() {
        let row = record
            .iter()
            .zip(&types)
            .zip(&names)
            .map(|((field, ty), column)| parse_cell(field, *ty, column, line + 1))
            .collect::<Result<Vec<_>, _>>()?;
        table.push_row(row)?;
    }

    if let Some(idx) = index_col {
        table.drop_column(idx)?;
    }
    if !usecols.is_empty() {
        table = table.select(usecols.as_slice())?;
    }
    Ok(table)
}

impl FormatDriver for CsvDriver {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Table
    }

    fn read(&self, path: &Path, options: &FormatOptions) -> Result<ArtifactValue, FormatError> {
        let delimiter = options.byte_or("delimiter", b',')?;

        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(open_file(path)?);

        let header = reader.headers()?.clone();
        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        decode(&header, &records, options).map(ArtifactValue::Table)
    }

    fn write(
        &self,
        value: &ArtifactValue,
        path: &Path,
        options: &FormatOptions,
    ) -> Result<WriteSummary, FormatError> {
        let table = value
            .as_table()
            .ok_or_else(|| wrong_kind(TAG, ArtifactKind::Table, value))?;
        let delimiter = options.byte_or("delimiter", b',')?;
        let with_index = options.bool_or("index", false)?;

        let mut writer = ::csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(create_file(path)?);

        let (header, records) = render(table, with_index);
        if !table.columns().is_empty() {
            writer.write_record(&header)?;
        }
        for record in &records {
            writer.write_record(record)?;
        }
        writer.flush().map_err(|e| FormatError::io_error(path, e))?;
        drop(writer);

        Ok(WriteSummary {
            bytes: file_size(path)?,
            records: table.len(),
        })
    }

    fn canonicalize(&self, value: ArtifactValue, write_options: &FormatOptions) -> ArtifactValue {
        let ArtifactValue::Table(table) = &value else {
            return value;
        };
        let with_index = write_options.bool_or("index", false).unwrap_or(false);
        let (header, records) = render(table, with_index);
        match decode(&header, &records, &FormatOptions::new()) {
            Ok(table) => ArtifactValue::Table(table),
            Err(_) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn edges() -> Table {
        Table::from_rows(
            ["source", "target", "weight"],
            vec![row!["A", "B", 1], row!["B", "C", 2]],
        )
        .unwrap()
    }

    fn roundtrip(table: &Table, write: &FormatOptions, read: &FormatOptions) -> Table {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        CsvDriver
            .write(&ArtifactValue::Table(table.clone()), &path, write)
            .unwrap();
        match CsvDriver.read(&path, read).unwrap() {
            ArtifactValue::Table(t) => t,
            other => panic!("expected table, got {:?}", other.kind()),
        }
    }

    #[test]
    fn write_then_read_preserves_rows() {
        let table = edges();
        let back = roundtrip(&table, &FormatOptions::new(), &FormatOptions::new());
        assert_eq!(back, table);
    }

    #[test]
    fn floats_and_nulls_survive() {
        let table = Table::from_rows(
            ["node", "score", "flag"],
            vec![
                row!["a", 2.0, true],
                row!["b", 0.5, Cell::Null],
                row!["c", Cell::Null, false],
            ],
        )
        .unwrap();
        let back = roundtrip(&table, &FormatOptions::new(), &FormatOptions::new());
        assert_eq!(back, table);
    }

    #[test]
    fn file_layout_without_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.csv");
        let summary = CsvDriver
            .write(&ArtifactValue::Table(edges()), &path, &FormatOptions::new())
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "source,target,weight\nA,B,1\nB,C,2\n");
        assert_eq!(summary.records, 2);
        assert_eq!(summary.bytes, text.len() as u64);
    }

    #[test]
    fn index_column_written_and_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.csv");
        CsvDriver
            .write(
                &ArtifactValue::Table(edges()),
                &path,
                &FormatOptions::new().with("index", true),
            )
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(",source,target,weight\n0,A,B,1\n"));

        let back = CsvDriver
            .read(&path, &FormatOptions::new().with("index_col", 0))
            .unwrap();
        assert_eq!(back, ArtifactValue::Table(edges()));
    }

    #[test]
    fn dtypes_override_inference() {
        let read = FormatOptions::new().with("dtypes", json!({"weight": "float", "source": "str"}));
        let back = roundtrip(&edges(), &FormatOptions::new(), &read);
        assert_eq!(back.get(0, "weight"), Some(&Cell::Float(1.0)));
    }

    #[test]
    fn dtype_parse_failure_is_malformed() {
        let read = FormatOptions::new().with("dtypes", json!({"source": "int"}));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.csv");
        CsvDriver
            .write(&ArtifactValue::Table(edges()), &path, &FormatOptions::new())
            .unwrap();
        assert!(matches!(
            CsvDriver.read(&path, &read),
            Err(FormatError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_dtype_is_invalid_option() {
        let read = FormatOptions::new().with("dtypes", json!({"weight": "decimal"}));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.csv");
        CsvDriver
            .write(&ArtifactValue::Table(edges()), &path, &FormatOptions::new())
            .unwrap();
        assert!(matches!(
            CsvDriver.read(&path, &read),
            Err(FormatError::InvalidOption { .. })
        ));
    }

    #[test]
    fn usecols_selects_columns() {
        let read = FormatOptions::new().with("usecols", json!(["target", "source"]));
        let back = roundtrip(&edges(), &FormatOptions::new(), &read);
        assert_eq!(back.columns(), &["target".to_string(), "source".to_string()]);
        assert_eq!(back.rows()[0], row!["B", "A"]);
    }

    #[test]
    fn tab_delimiter() {
        let opts = FormatOptions::new().with("delimiter", "\t");
        let back = roundtrip(&edges(), &opts, &opts);
        assert_eq!(back, edges());
    }

    #[test]
    fn writing_a_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvDriver
            .write(
                &ArtifactValue::Document(json!({})),
                &dir.path().join("x.csv"),
                &FormatOptions::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            FormatError::WrongKind {
                actual: ArtifactKind::Document,
                ..
            }
        ));
    }

    fn read_back(table: &Table) -> (String, Table) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.csv");
        CsvDriver
            .write(&ArtifactValue::Table(table.clone()), &path, &FormatOptions::new())
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        match CsvDriver.read(&path, &FormatOptions::new()).unwrap() {
            ArtifactValue::Table(t) => (text, t),
            other => panic!("expected table, got {:?}", other.kind()),
        }
    }

    #[test]
    fn numeric_looking_strings_keep_str_type() {
        let table = Table::from_rows(
            ["code", "flag", "n"],
            vec![row!["007", "true", 1], row!["042", "false", 2]],
        )
        .unwrap();
        let (text, back) = read_back(&table);
        assert!(text.starts_with("code:str,flag:str,n\n"), "{text}");
        assert_eq!(back, table);
    }

    #[test]
    fn annotation_only_when_inference_disagrees() {
        let table = Table::from_rows(["ratio", "name"], vec![row![0.5, "a"], row![2.0, "b"]]).unwrap();
        let (text, back) = read_back(&table);
        assert!(text.starts_with("ratio,name\n"));
        assert_eq!(back, table);
    }

    #[test]
    fn colon_in_column_name_survives() {
        let table = Table::from_rows(["t:int", "x"], vec![row![1, "a"]]).unwrap();
        let (text, back) = read_back(&table);
        assert!(text.starts_with("t:int:int,x\n"), "{text}");
        assert_eq!(back.columns(), table.columns());
        assert_eq!(back, table);
    }

    #[test]
    fn dtypes_win_over_annotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.csv");
        std::fs::write(&path, "code:str\n7\n").unwrap();
        let read = FormatOptions::new().with("dtypes", json!({"code": "int"}));
        let back = CsvDriver.read(&path, &read).unwrap();
        let table = back.as_table().unwrap();
        assert_eq!(table.columns(), &["code".to_string()]);
        assert_eq!(table.get(0, "code"), Some(&Cell::Int(7)));
    }

    #[test]
    fn canonical_form_matches_disk() {
        let table = Table::from_rows(
            ["code", "label"],
            vec![row!["007", ""], row!["8", "x"]],
        )
        .unwrap();
        let canonical = CsvDriver.canonicalize(ArtifactValue::Table(table.clone()), &FormatOptions::new());
        let (_, back) = read_back(&table);
        assert_eq!(canonical, ArtifactValue::Table(back.clone()));
        assert_eq!(back.get(0, "label"), Some(&Cell::Null));
        assert_eq!(back.get(0, "code"), Some(&Cell::from("007")));
    }

    #[test]
    fn canonical_form_includes_written_index() {
        let canonical = CsvDriver.canonicalize(
            ArtifactValue::Table(edges()),
            &FormatOptions::new().with("index", true),
        );
        let table = canonical.as_table().unwrap();
        assert_eq!(table.columns()[0], "");
        assert_eq!(table.get(1, ""), Some(&Cell::Int(1)));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvDriver
            .read(&dir.path().join("absent.csv"), &FormatOptions::new())
            .unwrap_err();
        assert!(err.is_missing_file());
    }
}
