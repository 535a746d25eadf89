//! Attributed graphs backed by petgraph
//!
//! Nodes are identified by string ids and edges carry typed attributes,
//! including a numeric `weight`. Persisted in node-link layout.

use crate::error::ValueError;
use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the numeric edge attribute used as weight
pub const WEIGHT: &str = "weight";

/// Typed node or edge attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttrValue {
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

    /// Borrow string content
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Attribute map, sorted by name
pub type Attrs = BTreeMap<String, AttrValue>;

#[derive(Debug, Clone)]
struct NodeData {
    id: String,
    attrs: Attrs,
}

/// Borrowed view of one edge
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub attrs: &'a Attrs,
}

impl EdgeView<'_> {
    /// Edge weight, 1.0 when the attribute is absent or not numeric
    #[inline]
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.attrs.get(WEIGHT).and_then(AttrValue::as_f64).unwrap_or(1.0)
    }
}

/// Directed or undirected graph with attributed nodes and edges
///
/// Undirected graphs share the directed storage; edge direction is simply
/// ignored by degree queries and equality.
#[derive(Debug, Clone)]
pub struct AttrGraph {
    directed: bool,
    graph: DiGraph<NodeData, Attrs>,
    index: IndexMap<String, NodeIndex>,
}

impl AttrGraph {
    /// Create empty graph
    #[must_use]
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            graph: DiGraph::new(),
            index: IndexMap::new(),
        }
    }

    /// Create empty directed graph
    #[inline]
    #[must_use]
    pub fn directed() -> Self {
        Self::new(true)
    }

    /// Create empty undirected graph
    #[inline]
    #[must_use]
    pub fn undirected() -> Self {
        Self::new(false)
    }

    /// Check if edges are directed
    #[inline]
    #[must_use]
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Add node or merge attributes into an existing one
    pub fn add_node(&mut self, id: impl Into<String>, attrs: Attrs) {
        let id = id.into();
        let idx = self.ensure_node(&id);
        self.graph[idx].attrs.extend(attrs);
    }

    /// Set one node attribute, adding the node if needed
    pub fn set_node_attr(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<AttrValue>,
    ) {
        let id = id.into();
        let idx = self.ensure_node(&id);
        self.graph[idx].attrs.insert(name.into(), value.into());
    }

    /// Add edge, adding missing endpoints
    pub fn add_edge(&mut self, source: &str, target: &str, attrs: Attrs) {
        let a = self.ensure_node(source);
        let b = self.ensure_node(target);
        self.graph.add_edge(a, b, attrs);
    }

    /// Add edge carrying only a weight
    pub fn add_weighted_edge(&mut self, source: &str, target: &str, weight: f64) {
        let mut attrs = Attrs::new();
        attrs.insert(WEIGHT.to_owned(), AttrValue::Float(weight));
        self.add_edge(source, target, attrs);
    }

    /// Add edge between nodes that must already exist
    ///
    /// # Errors
    /// Returns `ValueError::UnknownNode` for a missing endpoint
    pub fn try_add_edge(&mut self, source: &str, target: &str, attrs: Attrs) -> Result<(), ValueError> {
        let a = self.node_index(source)?;
        let b = self.node_index(target)?;
        self.graph.add_edge(a, b, attrs);
        Ok(())
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if node exists
    #[inline]
    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Attributes of a node
    #[must_use]
    pub fn node_attrs(&self, id: &str) -> Option<&Attrs> {
        self.index.get(id).map(|&idx| &self.graph[idx].attrs)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &Attrs)> {
        self.index.values().map(|&idx| {
            let node = &self.graph[idx];
            (node.id.as_str(), &node.attrs)
        })
    }

    /// Edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = EdgeView<'_>> {
        self.graph.edge_references().map(|e| EdgeView {
            source: &self.graph[e.source()].id,
            target: &self.graph[e.target()].id,
            attrs: e.weight(),
        })
    }

    /// Number of incoming edges (all incident edges when undirected)
    #[must_use]
    pub fn in_degree(&self, id: &str) -> usize {
        self.degree(id, Direction::Incoming)
    }

    /// Number of outgoing edges (all incident edges when undirected)
    #[must_use]
    pub fn out_degree(&self, id: &str) -> usize {
        self.degree(id, Direction::Outgoing)
    }

    /// Sum of weights over all incident edges
    #[must_use]
    pub fn strength(&self, id: &str) -> f64 {
        let Some(&idx) = self.index.get(id) else {
            return 0.0;
        };
        [Direction::Outgoing, Direction::Incoming]
            .into_iter()
            .flat_map(|dir| self.graph.edges_directed(idx, dir))
            .map(|e| {
                e.weight()
                    .get(WEIGHT)
                    .and_then(AttrValue::as_f64)
                    .unwrap_or(1.0)
            })
            .sum()
    }

    /// Remove a node attribute everywhere
    pub fn drop_node_attr(&mut self, name: &str) {
        for node in self.graph.node_weights_mut() {
            node.attrs.remove(name);
        }
    }

    /// Remove an edge attribute everywhere
    pub fn drop_edge_attr(&mut self, name: &str) {
        for attrs in self.graph.edge_weights_mut() {
            attrs.remove(name);
        }
    }

    fn degree(&self, id: &str, dir: Direction) -> usize {
        let Some(&idx) = self.index.get(id) else {
            return 0;
        };
        if self.directed {
            self.graph.edges_directed(idx, dir).count()
        } else {
            self.graph.edges_directed(idx, Direction::Outgoing).count()
                + self.graph.edges_directed(idx, Direction::Incoming).count()
        }
    }

    fn node_index(&self, id: &str) -> Result<NodeIndex, ValueError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| ValueError::UnknownNode(id.to_owned()))
    }

    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(NodeData {
            id: id.to_owned(),
            attrs: Attrs::new(),
        });
        self.index.insert(id.to_owned(), idx);
        idx
    }

    /// Edge multiset key: endpoints (sorted when undirected) plus attributes
    fn edge_keys(&self) -> Vec<(&str, &str, String)> {
        let mut keys: Vec<_> = self
            .edges()
            .map(|e| {
                let (a, b) = if !self.directed && e.target < e.source {
                    (e.target, e.source)
                } else {
                    (e.source, e.target)
                };
                // Attribute maps hold floats, so compare their canonical JSON form
                let attrs = serde_json::to_string(e.attrs).unwrap_or_default();
                (a, b, attrs)
            })
            .collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for AttrGraph {
    fn default() -> Self {
        Self::directed()
    }
}

/// Set semantics: node order and edge order do not matter
impl PartialEq for AttrGraph {
    fn eq(&self, other: &Self) -> bool {
        self.directed == other.directed
            && self.node_count() == other.node_count()
            && self.edge_count() == other.edge_count()
            && self
                .nodes()
                .all(|(id, attrs)| other.node_attrs(id) == Some(attrs))
            && self.edge_keys() == other.edge_keys()
    }
}

/// Node id as found on disk; numeric ids are accepted and stringified
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum NodeLinkId {
    Str(String),
    Int(i64),
}

impl NodeLinkId {
    fn into_string(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::Int(i) => i.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeLinkNode {
    id: NodeLinkId,
    #[serde(flatten)]
    attrs: Attrs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeLinkEdge {
    source: NodeLinkId,
    target: NodeLinkId,
    #[serde(flatten)]
    attrs: Attrs,
}

/// On-disk node-link layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NodeLink {
    directed: bool,
    #[serde(default)]
    multigraph: bool,
    #[serde(default)]
    graph: serde_json::Map<String, serde_json::Value>,
    nodes: Vec<NodeLinkNode>,
    #[serde(alias = "edges")]
    links: Vec<NodeLinkEdge>,
}

impl From<&AttrGraph> for NodeLink {
    fn from(graph: &AttrGraph) -> Self {
        Self {
            directed: graph.directed,
            multigraph: false,
            graph: serde_json::Map::new(),
            nodes: graph
                .nodes()
                .map(|(id, attrs)| NodeLinkNode {
                    id: NodeLinkId::Str(id.to_owned()),
                    attrs: attrs.clone(),
                })
                .collect(),
            links: graph
                .edges()
                .map(|e| NodeLinkEdge {
                    source: NodeLinkId::Str(e.source.to_owned()),
                    target: NodeLinkId::Str(e.target.to_owned()),
                    attrs: e.attrs.clone(),
                })
                .collect(),
        }
    }
}

impl TryFrom<NodeLink> for AttrGraph {
    type Error = ValueError;

    fn try_from(layout: NodeLink) -> Result<Self, Self::Error> {
        let mut graph = Self::new(layout.directed);
        for node in layout.nodes {
            graph.add_node(node.id.into_string(), node.attrs);
        }
        for edge in layout.links {
            graph.try_add_edge(
                &edge.source.into_string(),
                &edge.target.into_string(),
                edge.attrs,
            )?;
        }
        Ok(graph)
    }
}
