//! Concurrent writers on one concept graph
//!
//! Run with: `cargo test --test concurrency`

mod common;

use common::TestGraph;
use marie::{
    ConceptGraph, ConceptId, GraphError, InMemoryRegistry, Laboratory, NewTag, OpenStore,
    RelationshipDraft, RelationshipType, SqliteStore,
};
use std::sync::{Arc, Barrier};
use std::thread;

const WRITERS: usize = 8;

#[test]
fn concurrent_asserts_on_one_triple_leave_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let t = Arc::new(TestGraph::at_path(&dir.path().join("graph.db"), &["a", "b"]));
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let t = Arc::clone(&t);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                t.graph
                    .assert_relationship(
                        RelationshipDraft::new("a".into(), "b".into(), RelationshipType::Causal)
                            .strength(i as f32 / WRITERS as f32),
                    )
                    .unwrap()
            })
        })
        .collect();

    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    let out = t.graph.list_outgoing(&"a".into(), true).unwrap();
    assert_eq!(out.len(), 1);
    // The final strength is one of the written values
    let strength = out[0].relationship.strength;
    assert!((0..WRITERS).any(|i| (i as f32 / WRITERS as f32) == strength));
}

#[test]
fn separate_connections_on_one_file_serialize() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let registry = Arc::new(InMemoryRegistry::new());
    let lab = registry.upsert_laboratory(Laboratory::new("Shared"));
    registry.register_concept("a".into(), &lab).unwrap();
    registry.register_concept("b".into(), &lab).unwrap();

    // Open the schema once so both connections see it
    drop(SqliteStore::open(&path).unwrap());

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = Arc::new(SqliteStore::open(&path).unwrap());
                let graph = ConceptGraph::new(store, registry);
                barrier.wait();
                for _ in 0..20 {
                    graph
                        .assert_relationship(RelationshipDraft::new(
                            "a".into(),
                            "b".into(),
                            RelationshipType::Semantic,
                        ))
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let graph = ConceptGraph::new(store, registry);
    assert_eq!(graph.list_outgoing(&ConceptId::from("a"), true).unwrap().len(), 1);
}

#[test]
fn concurrent_tag_creation_keeps_names_unique_per_scope() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tags.db");
    let registry = Arc::new(InMemoryRegistry::new());
    drop(SqliteStore::open(&path).unwrap());

    for round in 0..10 {
        let name = format!("topic{}", round);
        let barrier = Arc::new(Barrier::new(WRITERS));
        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                let path = path.clone();
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let name = name.clone();
                thread::spawn(move || {
                    let store = Arc::new(SqliteStore::open(&path).unwrap());
                    let graph = ConceptGraph::new(store, registry);
                    barrier.wait();
                    graph.create_tag(NewTag::new(name))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let created = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(created, 1, "round {}", round);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, GraphError::InvalidArgument(_))));
    }

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let graph = ConceptGraph::new(store, registry);
    assert_eq!(graph.list_tags(None).unwrap().len(), 10);
}

#[test]
fn readers_run_alongside_writers() {
    let dir = tempfile::tempdir().unwrap();
    let names: Vec<String> = (0..20).map(|i| format!("n{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let t = Arc::new(TestGraph::at_path(&dir.path().join("rw.db"), &refs));

    let writer = {
        let t = Arc::clone(&t);
        let names = names.clone();
        thread::spawn(move || {
            for pair in names.windows(2) {
                t.relate(&pair[0], &pair[1], RelationshipType::Temporal);
            }
        })
    };
    let reader = {
        let t = Arc::clone(&t);
        thread::spawn(move || {
            for _ in 0..20 {
                let component = t.graph.connected_component(&"n0".into(), 25).unwrap();
                assert!(component.contains(&ConceptId::from("n0")));
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(t.graph.connected_component(&"n0".into(), 25).unwrap().len(), 20);
}
