//! Common test utilities for concept graph integration tests
//!
//! Builds graphs over in-memory or file databases with a registry of
//! concepts, and provides a naive reachability oracle for checking
//! traversal results.

#![allow(dead_code)]

use marie::{
    ConceptGraph, ConceptId, InMemoryRegistry, Laboratory, LaboratoryId, OpenStore,
    RelationshipDraft, RelationshipId, RelationshipType, SqliteStore,
};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

/// A graph plus the registry and laboratory its concepts live in
pub struct TestGraph {
    pub graph: ConceptGraph,
    pub registry: Arc<InMemoryRegistry>,
    pub lab: LaboratoryId,
}

impl TestGraph {
    /// In-memory store with the given concepts registered in one laboratory
    pub fn in_memory(concepts: &[&str]) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().expect("in-memory store"));
        Self::with_store(store, concepts)
    }

    /// File-backed store at `path`
    pub fn at_path(path: &Path, concepts: &[&str]) -> Self {
        let store = Arc::new(SqliteStore::open(path).expect("file store"));
        Self::with_store(store, concepts)
    }

    fn with_store(store: Arc<SqliteStore>, concepts: &[&str]) -> Self {
        let registry = Arc::new(InMemoryRegistry::new());
        let lab = registry.upsert_laboratory(Laboratory::new("Test Laboratory"));
        for c in concepts {
            registry.register_concept(ConceptId::from(*c), &lab).expect("register concept");
        }
        Self {
            graph: ConceptGraph::new(store, registry.clone()),
            registry,
            lab,
        }
    }

    /// Assert a default-weight relationship
    pub fn relate(&self, source: &str, target: &str, relationship_type: RelationshipType) -> RelationshipId {
        self.graph
            .assert_relationship(RelationshipDraft::new(source.into(), target.into(), relationship_type))
            .expect("assert relationship")
    }

    /// Assert a relationship navigable only from source to target
    pub fn relate_directed(&self, source: &str, target: &str) -> RelationshipId {
        self.graph
            .assert_relationship(
                RelationshipDraft::new(source.into(), target.into(), RelationshipType::Causal).bidirectional(false),
            )
            .expect("assert relationship")
    }
}

pub fn ids(names: &[&str]) -> BTreeSet<ConceptId> {
    names.iter().map(|n| ConceptId::from(*n)).collect()
}

/// Edges of a reference model: (source, target, bidirectional)
pub type ModelEdge = (String, String, bool);

/// Hop distance from `start` to every concept it can reach, by plain BFS
/// over an adjacency list rebuilt from scratch
pub fn reference_distances(edges: &[ModelEdge], start: &str) -> HashMap<String, usize> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (s, t, bidirectional) in edges {
        adjacency.entry(s.as_str()).or_default().push(t.as_str());
        if *bidirectional {
            adjacency.entry(t.as_str()).or_default().push(s.as_str());
        }
    }

    let mut distances: HashMap<String, usize> = HashMap::new();
    distances.insert(start.to_string(), 0);
    let mut frontier = vec![start];
    let mut depth = 0;
    while !frontier.is_empty() {
        depth += 1;
        let mut next = Vec::new();
        for node in frontier {
            for &neighbor in adjacency.get(node).into_iter().flatten() {
                if !distances.contains_key(neighbor) {
                    distances.insert(neighbor.to_string(), depth);
                    next.push(neighbor);
                }
            }
        }
        frontier = next;
    }
    distances
}
