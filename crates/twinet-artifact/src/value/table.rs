//! Tabular values: ordered named columns, rows of typed cells

use crate::error::ValueError;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Single typed table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    /// Check if cell is empty
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow string content
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric content; integers widen to floats
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Boolean content
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Column type this cell belongs to; `None` for null
    #[inline]
    #[must_use]
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ColumnType::Bool),
            Self::Int(_) => Some(ColumnType::Int),
            Self::Float(_) => Some(ColumnType::Float),
            Self::Str(_) => Some(ColumnType::Str),
        }
    }
}

/// Text rendering used by the csv driver
///
/// Whole floats keep a trailing `.0` so they read back as floats.
impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Declared or inferred type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    Float,
    Bool,
    Str,
}

impl ColumnType {
    /// Canonical name, accepted back by `FromStr`
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Str => "str",
        }
    }

    /// Infer the narrowest type fitting every non-empty field
    ///
    /// Order of preference: int, float, bool, string. All-empty columns are strings.
    pub fn infer<'a>(fields: impl Iterator<Item = &'a str> + Clone) -> Self {
        let mut non_empty = fields.filter(|f| !f.is_empty()).peekable();
        if non_empty.peek().is_none() {
            return Self::Str;
        }
        let candidates = [Self::Int, Self::Float, Self::Bool];
        candidates
            .into_iter()
            .find(|ty| non_empty.clone().all(|f| ty.parse(f).is_some()))
            .unwrap_or(Self::Str)
    }

    /// Parse a non-empty field as this type
    #[must_use]
    pub fn parse(self, field: &str) -> Option<Cell> {
        let trimmed = field.trim();
        match self {
            Self::Int => trimmed.parse().ok().map(Cell::Int),
            Self::Float => trimmed.parse().ok().map(Cell::Float),
            Self::Bool => match trimmed {
                "true" | "True" | "TRUE" => Some(Cell::Bool(true)),
                "false" | "False" | "FALSE" => Some(Cell::Bool(false)),
                _ => None,
            },
            Self::Str => Some(Cell::Str(field.to_owned())),
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" | "int64" | "integer" => Ok(Self::Int),
            "float" | "float64" | "double" => Ok(Self::Float),
            "bool" | "boolean" => Ok(Self::Bool),
            "str" | "string" | "object" => Ok(Self::Str),
            other => Err(format!("unknown column type '{other}'")),
        }
    }
}

/// Table of named columns and typed rows
///
/// # Invariants
/// - Every row has exactly `columns().len()` cells
/// - Row order is preserved through write and read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create empty table with the given columns
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create table from columns and rows
    ///
    /// # Errors
    /// Returns `ValueError::ArityMismatch` if any row has the wrong width
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Cell>>) -> Result<Self, ValueError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Append a row
    ///
    /// # Errors
    /// Returns `ValueError::ArityMismatch` if the row has the wrong width
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), ValueError> {
        if row.len() != self.columns.len() {
            return Err(ValueError::ArityMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names in order
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in order
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Mutable rows in order
    ///
    /// Each row is a fixed-width slice, so cells can be replaced but never
    /// added or removed.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [Cell]> + '_ {
        self.rows.iter_mut().map(Vec::as_mut_slice)
    }

    /// Replace the cell at `row` in column `name`, returning the old one
    ///
    /// # Errors
    /// - `ValueError::UnknownColumn` if the column does not exist
    /// - `ValueError::RowOutOfRange` if `row` is past the last row
    pub fn set(&mut self, row: usize, name: &str, cell: impl Into<Cell>) -> Result<Cell, ValueError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ValueError::UnknownColumn(name.to_owned()))?;
        let len = self.rows.len();
        let target = self
            .rows
            .get_mut(row)
            .map(|r| &mut r[idx])
            .ok_or(ValueError::RowOutOfRange { index: row, len })?;
        Ok(std::mem::replace(target, cell.into()))
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if table has no rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate one column top to bottom
    ///
    /// # Errors
    /// Returns `ValueError::UnknownColumn` if the column does not exist
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Cell>, ValueError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ValueError::UnknownColumn(name.to_owned()))?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Cell at `row` in column `name`
    #[must_use]
    pub fn get(&self, row: usize, name: &str) -> Option<&Cell> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// New table keeping only `names`, in the given order
    ///
    /// # Errors
    /// Returns `ValueError::UnknownColumn` for a missing column
    pub fn select(&self, names: &[impl AsRef<str>]) -> Result<Self, ValueError> {
        let indices = names
            .iter()
            .map(|n| {
                self.column_index(n.as_ref())
                    .ok_or_else(|| ValueError::UnknownColumn(n.as_ref().to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Remove the column at `index`
    ///
    /// # Errors
    /// Returns `ValueError::ColumnOutOfRange` if `index` is past the last column
    pub fn drop_column(&mut self, index: usize) -> Result<String, ValueError> {
        if index >= self.columns.len() {
            return Err(ValueError::ColumnOutOfRange {
                index,
                width: self.columns.len(),
            });
        }
        for row in &mut self.rows {
            row.remove(index);
        }
        Ok(self.columns.remove(index))
    }
}

/// Build a table row from heterogeneous values
///
/// ```rust,ignore
/// let row = row!["alice", "bob", 1.5];
/// ```
#[macro_export]
macro_rules! row {
    ($($cell:expr),* $(,)?) => {
        vec![$($crate::Cell::from($cell)),*]
    };
}
