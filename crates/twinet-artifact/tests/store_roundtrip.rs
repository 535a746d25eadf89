//! Store round trips through every built-in driver

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use twinet_artifact::{
    row, ArtifactSpec, ArtifactStore, ArtifactValue, AttrGraph, Cell, FormatOptions, StoreError,
    Table,
};

fn edges() -> Table {
    Table::from_rows(
        ["source", "target", "weight"],
        vec![row!["A", "B", 1], row!["B", "C", 2]],
    )
    .unwrap()
}

#[test]
fn edge_table_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let key = store
        .declare_one(ArtifactSpec::new("p", "s", "edges", "csv"))
        .unwrap();

    store.write(&key, edges()).unwrap();
    assert!(store.exists(&key).unwrap());

    let back = store.read_table(&key).unwrap();
    assert_eq!(back.columns(), edges().columns());
    assert_eq!(back.rows(), edges().rows());

    std::fs::remove_file(dir.path().join("p/s/edges.csv")).unwrap();
    assert!(matches!(store.read(&key), Err(StoreError::NotFound { .. })));
}

#[test]
fn every_driver_round_trips_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());

    let mut graph = AttrGraph::directed();
    graph.set_node_attr("A", "label", "alice");
    graph.add_weighted_edge("A", "B", 1.5);
    graph.add_weighted_edge("B", "C", 2.0);

    let cases: Vec<(&str, ArtifactValue)> = vec![
        ("csv", edges().into()),
        ("json", json!({"nodes": 3, "top": ["B", "A"]}).into()),
        ("yaml", json!({"threshold": 0.25, "enabled": true}).into()),
        ("graph", graph.into()),
    ];

    for (tag, value) in cases {
        let key = store
            .declare_one(ArtifactSpec::new("p", "s", "artifact", tag))
            .unwrap();
        store.write(&key, value.clone()).unwrap();
        store.invalidate_all();
        assert_eq!(store.read(&key).unwrap(), value, "driver '{tag}'");
    }
}

#[test]
fn cached_values_are_isolated_from_callers() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let key = store
        .declare_one(ArtifactSpec::new("p", "s", "edges", "csv"))
        .unwrap();
    store.write(&key, edges()).unwrap();

    let mut first = store.read_table(&key).unwrap();
    first.set(0, "source", Cell::from("Z")).unwrap();

    assert_eq!(store.read_table(&key).unwrap(), edges());
    assert!(store.cache_stats().hits >= 2);
}

#[test]
fn redeclaration_replaces_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let spec = ArtifactSpec::new("p", "s", "edges", "csv");
    let key = store.declare_one(spec.clone()).unwrap();
    store.write(&key, edges()).unwrap();

    let projected = spec.with_read_options(FormatOptions::new().with("usecols", json!(["source"])));
    assert_eq!(store.declare_one(projected).unwrap(), key);

    let table = store.read_table(&key).unwrap();
    assert_eq!(table.columns(), &["source".to_string()]);
    assert_eq!(store.declared_keys(), vec![key]);
}

#[test]
fn later_stage_reads_earlier_stage_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let produced = store
        .declare_one(ArtifactSpec::new("network", "creation", "edges", "csv").with_prefix("ds1"))
        .unwrap();
    store.write(&produced, edges()).unwrap();

    let consumed = store
        .declare_one(
            ArtifactSpec::new("network", "metrics", "edges", "csv")
                .with_prefix("ds1")
                .in_directory("network/creation")
                .with_read_options(FormatOptions::new().with("usecols", json!(["target"]))),
        )
        .unwrap();

    assert!(store.exists(&consumed).unwrap());
    assert_eq!(store.read_table(&consumed).unwrap().columns(), &["target".to_string()]);
    assert_eq!(store.read_table(&produced).unwrap(), edges());
}

#[test]
fn concurrent_writes_to_distinct_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::with_capacity(dir.path(), 4));
    let keys = store
        .declare((0..16).map(|i| ArtifactSpec::new("p", "s", format!("doc{i}"), "json")))
        .unwrap();

    std::thread::scope(|scope| {
        for (i, key) in keys.iter().enumerate() {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                store.write(key, json!({ "i": i })).unwrap();
            });
        }
    });

    for (i, key) in keys.iter().enumerate() {
        assert_eq!(store.read_document(key).unwrap(), json!({ "i": i }));
    }
    assert!(store.cache_stats().entry_count <= 4);
}

#[test]
fn configuration_faults_surface_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());

    let unknown = store
        .declare_one(ArtifactSpec::new("p", "s", "edges", "parquet"))
        .unwrap_err();
    assert!(!unknown.is_retryable());

    let undeclared = store
        .write(&ArtifactSpec::new("p", "s", "edges", "csv").key(), edges())
        .unwrap_err();
    assert!(matches!(undeclared, StoreError::UndeclaredArtifact(_)));
    assert!(!undeclared.is_retryable());
}

#[test]
fn externally_modified_file_is_reread() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let key = store
        .declare_one(ArtifactSpec::new("p", "s", "doc", "json"))
        .unwrap();
    store.write(&key, json!({"v": 1})).unwrap();

    let path = store.descriptor(&key).unwrap().path().to_path_buf();
    std::fs::write(&path, r#"{"v": 2}"#).unwrap();
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(60))
        .unwrap();

    assert_eq!(store.read_document(&key).unwrap(), json!({"v": 2}));
}

fn text_cell() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9]{1,4}",
        "-?[0-9]{1,3}\\.[0-9]{1,2}",
        Just("true".to_owned()),
        Just("False".to_owned()),
        Just(String::new()),
        "[a-z]{1,6}",
    ]
}

proptest! {
    #[test]
    fn string_cells_keep_their_type(
        rows in proptest::collection::vec((text_cell(), text_cell(), 0i64..1000), 0..20)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let key = store.declare_one(ArtifactSpec::new("p", "s", "codes", "csv")).unwrap();

        let mut table = Table::new(["code", "label", "weight"]);
        for (code, label, weight) in rows {
            table.push_row(row![code, label, weight]).unwrap();
        }
        store.write(&key, table.clone()).unwrap();

        let warm = store.read_table(&key).unwrap();
        store.invalidate_all();
        let cold = store.read_table(&key).unwrap();
        prop_assert_eq!(&warm, &cold);

        // empty strings are indistinguishable from missing values on disk
        let expected: Vec<Vec<Cell>> = table
            .rows()
            .iter()
            .map(|r| {
                r.iter()
                    .map(|c| match c {
                        Cell::Str(s) if s.is_empty() => Cell::Null,
                        other => other.clone(),
                    })
                    .collect()
            })
            .collect();
        prop_assert_eq!(cold.columns(), table.columns());
        prop_assert_eq!(cold.rows(), expected.as_slice());
    }

    #[test]
    fn table_round_trip(
        rows in proptest::collection::vec(("node[0-9]{1,3}", "node[0-9]{1,3}", 0i64..1000), 0..20)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let key = store.declare_one(ArtifactSpec::new("p", "s", "edges", "csv")).unwrap();

        let mut table = Table::new(["source", "target", "weight"]);
        for (s, t, w) in rows {
            table.push_row(row![s, t, w]).unwrap();
        }
        store.write(&key, table.clone()).unwrap();
        store.invalidate_all();

        let back = store.read_table(&key).unwrap();
        prop_assert_eq!(back.rows(), table.rows());
    }
}
