//! Attributed graphs in node-link JSON layout
//!
//! Read options: `drop_node_attrs`, `drop_edge_attrs` (lists of attribute names).
//! Write option: `pretty` (default false).
//!
//! Node attribute `id` and edge attributes `source`/`target` share keys with
//! the layout itself and are rejected on write.

use super::{create_file, file_size, open_file, wrong_kind, FormatDriver, WriteSummary};
use crate::error::FormatError;
use crate::options::FormatOptions;
use crate::value::{ArtifactKind, ArtifactValue, AttrGraph, Attrs, NodeLink};
use std::io::Write;
use std::path::Path;

const TAG: &str = "graph";

/// Keys the layout owns on node and edge objects
const NODE_KEYS: &[&str] = &["id"];
const EDGE_KEYS: &[&str] = &["source", "target"];

fn reserved<'a>(attrs: &Attrs, keys: &[&'a str]) -> Option<&'a str> {
    keys.iter().copied().find(|key| attrs.contains_key(*key))
}

fn check_attr_names(graph: &AttrGraph) -> Result<(), FormatError> {
    for (id, attrs) in graph.nodes() {
        if let Some(key) = reserved(attrs, NODE_KEYS) {
            return Err(FormatError::Malformed(format!(
                "node '{id}' uses reserved attribute '{key}'"
            )));
        }
    }
    for edge in graph.edges() {
        if let Some(key) = reserved(edge.attrs, EDGE_KEYS) {
            return Err(FormatError::Malformed(format!(
                "edge '{}' -> '{}' uses reserved attribute '{key}'",
                edge.source, edge.target
            )));
        }
    }
    Ok(())
}

/// Node-link graph driver
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphDriver;

impl GraphDriver {
    /// Create new graph driver
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FormatDriver for GraphDriver {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Graph
    }

    fn read(&self, path: &Path, options: &FormatOptions) -> Result<ArtifactValue, FormatError> {
        let drop_node_attrs = options.string_list("drop_node_attrs")?;
        let drop_edge_attrs = options.string_list("drop_edge_attrs")?;

        let layout: NodeLink = serde_json::from_reader(open_file(path)?)?;
        let mut graph = AttrGraph::try_from(layout)?;

        for name in &drop_node_attrs {
            graph.drop_node_attr(name);
        }
        for name in &drop_edge_attrs {
            graph.drop_edge_attr(name);
        }
        Ok(ArtifactValue::Graph(graph))
    }

    fn write(
        &self,
        value: &ArtifactValue,
        path: &Path,
        options: &FormatOptions,
    ) -> Result<WriteSummary, FormatError> {
        let graph = value
            .as_graph()
            .ok_or_else(|| wrong_kind(TAG, ArtifactKind::Graph, value))?;
        let pretty = options.bool_or("pretty", false)?;
        check_attr_names(graph)?;
        let layout = NodeLink::from(graph);

        let mut writer = create_file(path)?;
        if pretty {
            serde_json::to_writer_pretty(&mut writer, &layout)?;
        } else {
            serde_json::to_writer(&mut writer, &layout)?;
        }
        writer.flush().map_err(|e| FormatError::io_error(path, e))?;
        drop(writer);

        Ok(WriteSummary {
            bytes: file_size(path)?,
            records: graph.edge_count(),
        })
    }
}
