//! Format-specific read/write options
//!
//! The store passes these through untouched; only drivers interpret them.

use crate::error::FormatError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Opaque option map handed to a format driver
///
/// # Examples
/// - csv read: `{"dtypes": {"weight": "float"}, "usecols": ["source", "target"]}`
/// - csv write: `{"index": false}`
/// - graph read: `{"drop_node_attrs": ["label"]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatOptions(Map<String, Value>);

impl FormatOptions {
    /// Create empty option map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    #[inline]
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Insert or replace an option
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Raw option value
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Check if no options are set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Boolean option, `default` when absent
    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, FormatError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(FormatError::invalid_option(
                name,
                format!("expected a boolean, got {other}"),
            )),
        }
    }

    /// Non-negative integer option
    pub fn usize(&self, name: &str) -> Result<Option<usize>, FormatError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| {
                    FormatError::invalid_option(name, format!("expected a position, got {n}"))
                }),
            Some(other) => Err(FormatError::invalid_option(
                name,
                format!("expected a position, got {other}"),
            )),
        }
    }

    /// Single ASCII character option (delimiters)
    pub fn byte_or(&self, name: &str, default: u8) -> Result<u8, FormatError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::String(s)) if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
            Some(other) => Err(FormatError::invalid_option(
                name,
                format!("expected a single ASCII character, got {other}"),
            )),
        }
    }

    /// List-of-strings option, empty when absent
    pub fn string_list(&self, name: &str) -> Result<Vec<String>, FormatError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_owned).ok_or_else(|| {
                        FormatError::invalid_option(name, format!("expected strings, got {item}"))
                    })
                })
                .collect(),
            Some(other) => Err(FormatError::invalid_option(
                name,
                format!("expected a list of strings, got {other}"),
            )),
        }
    }

    /// String-to-string map option, empty when absent
    pub fn string_map(&self, name: &str) -> Result<BTreeMap<String, String>, FormatError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| {
                    v.as_str()
                        .map(|s| (k.clone(), s.to_owned()))
                        .ok_or_else(|| {
                            FormatError::invalid_option(
                                name,
                                format!("value for '{k}' must be a string, got {v}"),
                            )
                        })
                })
                .collect(),
            Some(other) => Err(FormatError::invalid_option(
                name,
                format!("expected a map of strings, got {other}"),
            )),
        }
    }
}

impl From<Map<String, Value>> for FormatOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
