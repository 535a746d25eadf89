//! Network creation pipeline
//!
//! Per dataset:
//! 1. `ingest_edges`: input edge list → aggregated `<ds>__edges.csv`
//! 2. `build_graph` ∥ `degree_table`: `<ds>__network.graph`, `<ds>__degrees.csv`
//! 3. `summarize`: `<ds>__summary.json`
//!
//! Every task returns early when its output already exists, so a second run
//! over the same store neither reads nor writes anything.

use anyhow::{bail, Context};
use indexmap::IndexMap;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use twinet_artifact::{
    ArtifactKey, ArtifactSpec, ArtifactStore, AttrGraph, Cell, FormatOptions, StoreResult, Table,
};
use twinet_kernel::{Pipeline, Task};

/// Pipeline name, also the top-level output directory
pub const PIPELINE: &str = "network";

const STAGE: &str = "creation";
const INPUT_STAGE: &str = "input";
const TOP_NODES: usize = 5;

/// Keys of every artifact the pipeline touches for one dataset
#[derive(Debug, Clone)]
pub struct NetworkArtifacts {
    /// Raw edge list, `<input_dir>/<dataset>.csv`
    pub input: ArtifactKey,
    /// Aggregated edges
    pub edges: ArtifactKey,
    /// Directed weighted graph
    pub graph: ArtifactKey,
    /// Per-node degree table
    pub degrees: ArtifactKey,
    /// Summary document
    pub summary: ArtifactKey,
}

impl NetworkArtifacts {
    fn declare(dataset: &str, input_dir: &Path) -> (Self, Vec<ArtifactSpec>) {
        let input_types = json!({"source": "str", "target": "str", "weight": "float"});
        let output =
            |base: &str, tag: &str| ArtifactSpec::new(PIPELINE, STAGE, base, tag).with_prefix(dataset);

        let input = ArtifactSpec::new(PIPELINE, INPUT_STAGE, dataset, "csv")
            .in_directory(input_dir)
            .with_read_options(FormatOptions::new().with("dtypes", input_types.clone()));
        let edges = output("edges", "csv")
            .with_read_options(FormatOptions::new().with("dtypes", input_types));
        let graph = output("network", "graph");
        let degrees = output("degrees", "csv")
            .with_read_options(FormatOptions::new().with("dtypes", json!({"node": "str"})));
        let summary = output("summary", "json");

        let keys = Self {
            input: input.key(),
            edges: edges.key(),
            graph: graph.key(),
            degrees: degrees.key(),
            summary: summary.key(),
        };
        (keys, vec![input, edges, graph, degrees, summary])
    }

    /// Outputs produced by the pipeline, excluding the input
    #[must_use]
    pub fn outputs(&self) -> [&ArtifactKey; 4] {
        [&self.edges, &self.graph, &self.degrees, &self.summary]
    }
}

/// Declare the dataset's artifacts and assemble its plan
///
/// Relative `input_dir` paths resolve against the store root.
///
/// # Errors
/// Store errors from declaring the artifacts
pub fn build_pipeline(
    store: &Arc<ArtifactStore>,
    dataset: &str,
    input_dir: &Path,
) -> StoreResult<(Pipeline, NetworkArtifacts)> {
    let (artifacts, specs) = NetworkArtifacts::declare(dataset, input_dir);

    let pipeline = Pipeline::builder(PIPELINE)
        .artifacts(specs)
        .sequential(ingest_edges(store, &artifacts))
        .concurrent([build_graph(store, &artifacts), degree_table(store, &artifacts)])
        .sequential(summarize(store, &artifacts, dataset))
        .build(store)?;

    Ok((pipeline, artifacts))
}

fn skip_if_present(store: &ArtifactStore, task: &str, outputs: &[&ArtifactKey]) -> anyhow::Result<bool> {
    let present = store.exists_all(outputs.iter().copied())?;
    if present {
        tracing::debug!(task, "outputs exist, skipping");
    }
    Ok(present)
}

fn ingest_edges(store: &Arc<ArtifactStore>, keys: &NetworkArtifacts) -> Task {
    let store = Arc::clone(store);
    let (input, output) = (keys.input.clone(), keys.edges.clone());
    Task::new("ingest_edges", move || {
        if skip_if_present(&store, "ingest_edges", &[&output])? {
            return Ok(());
        }
        let raw = store.read_table(&input)?;
        let mut weights: IndexMap<(String, String), f64> = IndexMap::new();
        for (source, target, weight) in edge_rows(&raw)? {
            *weights.entry((source, target)).or_insert(0.0) += weight;
        }

        let rows = weights
            .into_iter()
            .map(|((source, target), weight)| vec![source.into(), target.into(), weight.into()])
            .collect();
        let edges = Table::from_rows(["source", "target", "weight"], rows)?;
        let summary = store.write(&output, edges)?;
        tracing::info!(edges = summary.records, raw = raw.len(), "edges aggregated");
        Ok(())
    })
}

fn build_graph(store: &Arc<ArtifactStore>, keys: &NetworkArtifacts) -> Task {
    let store = Arc::clone(store);
    let (input, output) = (keys.edges.clone(), keys.graph.clone());
    Task::new("build_graph", move || {
        if skip_if_present(&store, "build_graph", &[&output])? {
            return Ok(());
        }
        let graph = graph_from(&store.read_table(&input)?)?;
        store.write(&output, graph)?;
        Ok(())
    })
}

fn degree_table(store: &Arc<ArtifactStore>, keys: &NetworkArtifacts) -> Task {
    let store = Arc::clone(store);
    let (input, output) = (keys.edges.clone(), keys.degrees.clone());
    Task::new("degree_table", move || {
        if skip_if_present(&store, "degree_table", &[&output])? {
            return Ok(());
        }
        let graph = graph_from(&store.read_table(&input)?)?;
        let rows = graph
            .nodes()
            .map(|(id, _)| {
                Ok(vec![
                    Cell::from(id),
                    Cell::Int(i64::try_from(graph.in_degree(id))?),
                    Cell::Int(i64::try_from(graph.out_degree(id))?),
                    Cell::Float(graph.strength(id)),
                ])
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let table = Table::from_rows(["node", "in_degree", "out_degree", "strength"], rows)?;
        store.write(&output, table)?;
        Ok(())
    })
}

fn summarize(store: &Arc<ArtifactStore>, keys: &NetworkArtifacts, dataset: &str) -> Task {
    let store = Arc::clone(store);
    let (graph_key, degrees_key, output) =
        (keys.graph.clone(), keys.degrees.clone(), keys.summary.clone());
    let dataset = dataset.to_owned();
    Task::new("summarize", move || {
        if skip_if_present(&store, "summarize", &[&output])? {
            return Ok(());
        }
        let graph = store.read_graph(&graph_key)?;
        let degrees = store.read_table(&degrees_key)?;

        let mut ranked = degrees
            .column("node")?
            .zip(degrees.column("strength")?)
            .filter_map(|(node, strength)| Some((node.as_str()?.to_owned(), strength.as_f64()?)))
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(TOP_NODES);

        let total_weight: f64 = graph.edges().map(|e| e.weight()).sum();
        let document = json!({
            "dataset": dataset,
            "nodes": graph.node_count(),
            "edges": graph.edge_count(),
            "total_weight": total_weight,
            "top_strength": ranked
                .iter()
                .map(|(node, strength)| json!({"node": node, "strength": strength}))
                .collect::<Vec<_>>(),
        });
        store.write(&output, document)?;
        Ok(())
    })
}

/// `(source, target, weight)` per row; a missing weight column or cell counts as 1
fn edge_rows(table: &Table) -> anyhow::Result<Vec<(String, String, f64)>> {
    let column = |name: &str| {
        table
            .column_index(name)
            .with_context(|| format!("edge list has no '{name}' column"))
    };
    let source = column("source")?;
    let target = column("target")?;
    let weight = table.column_index("weight");

    table
        .rows()
        .iter()
        .enumerate()
        .map(|(line, row)| {
            let (Some(s), Some(t)) = (row[source].as_str(), row[target].as_str()) else {
                bail!("row {}: source and target must be non-empty", line + 1);
            };
            let w = weight.and_then(|idx| row[idx].as_f64()).unwrap_or(1.0);
            Ok((s.to_owned(), t.to_owned(), w))
        })
        .collect()
}

fn graph_from(edges: &Table) -> anyhow::Result<AttrGraph> {
    let mut graph = AttrGraph::directed();
    for (source, target, weight) in edge_rows(edges)? {
        graph.add_weighted_edge(&source, &target, weight);
    }
    Ok(graph)
}
