//! In-memory artifact values
//!
//! Every artifact is one of three kinds:
//! - [`Table`]: rows of named, typed columns
//! - [`Document`]: arbitrary nested key/value structure
//! - [`AttrGraph`]: nodes and edges carrying typed attributes

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

mod graph;
mod table;

pub use graph::{AttrGraph, AttrValue, Attrs, EdgeView, WEIGHT};
pub(crate) use graph::NodeLink;
pub use table::{Cell, ColumnType, Table};

/// Hierarchical document value
pub type Document = serde_json::Value;

/// Kind of value an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Table,
    Document,
    Graph,
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Document => "document",
            Self::Graph => "graph",
        })
    }
}

/// Value read from or written to an artifact
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactValue {
    Table(Table),
    Document(Document),
    Graph(AttrGraph),
}

impl ArtifactValue {
    /// Kind of this value
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Table(_) => ArtifactKind::Table,
            Self::Document(_) => ArtifactKind::Document,
            Self::Graph(_) => ArtifactKind::Graph,
        }
    }

    /// Borrow as table
    #[inline]
    #[must_use]
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow as document
    #[inline]
    #[must_use]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Borrow as graph
    #[inline]
    #[must_use]
    pub fn as_graph(&self) -> Option<&AttrGraph> {
        match self {
            Self::Graph(g) => Some(g),
            _ => None,
        }
    }

    /// Number of records, as reported in write summaries
    ///
    /// Rows for tables, edges for graphs, top-level entries for documents.
    #[must_use]
    pub fn record_count(&self) -> usize {
        match self {
            Self::Table(t) => t.len(),
            Self::Graph(g) => g.edge_count(),
            Self::Document(Document::Array(items)) => items.len(),
            Self::Document(Document::Object(map)) => map.len(),
            Self::Document(Document::Null) => 0,
            Self::Document(_) => 1,
        }
    }
}

impl From<Table> for ArtifactValue {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

impl From<Document> for ArtifactValue {
    fn from(document: Document) -> Self {
        Self::Document(document)
    }
}

impl From<AttrGraph> for ArtifactValue {
    fn from(graph: AttrGraph) -> Self {
        Self::Graph(graph)
    }
}
