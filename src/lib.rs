//! Marie: concept relationship graph for laboratory workspaces
//!
//! Stores the typed, weighted links between concepts that a knowledge
//! workspace has collected, plus a hierarchical tagging scheme over those
//! concepts. Concept and laboratory records themselves live elsewhere; the
//! graph only holds their identifiers and asks a `ConceptRegistry` whether
//! they exist.
//!
//! # Core Concepts
//!
//! - **Relationships**: directed edges of a fixed set of types, carrying
//!   strength and confidence, optionally navigable in both directions
//! - **Tags**: a forest of labels, global or scoped to one laboratory
//! - **Queries**: neighbors, bounded components and paths over a snapshot
//!
//! # Example
//!
//! ```
//! use marie::{ConceptGraph, InMemoryRegistry, Laboratory, OpenStore, SqliteStore};
//! use marie::{RelationshipDraft, RelationshipType};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(InMemoryRegistry::new());
//! let lab = registry.upsert_laboratory(Laboratory::new("Philosophy"));
//! registry.register_concept("stoicism".into(), &lab).unwrap();
//! registry.register_concept("epicureanism".into(), &lab).unwrap();
//!
//! let store = Arc::new(SqliteStore::open_in_memory().unwrap());
//! let graph = ConceptGraph::new(store, registry);
//!
//! graph
//!     .assert_relationship(RelationshipDraft::new(
//!         "stoicism".into(),
//!         "epicureanism".into(),
//!         RelationshipType::Contradictory,
//!     ))
//!     .unwrap();
//! assert!(graph.path_exists(&"epicureanism".into(), &"stoicism".into(), 1).unwrap());
//! ```

pub mod config;
mod graph;
pub mod query;
pub mod storage;

pub use config::{ConfigError, GraphConfig};
pub use graph::{
    clamp_unit, Actor, ConceptGraph, ConceptId, ConceptRelationship, GraphError, GraphResult,
    HierarchyError, IdentifierRegistry, Laboratory, LaboratoryId, NewRelationship, NewTag,
    RelationshipDraft, RelationshipId, RelationshipType, RelationshipView, Tag, TagArena,
    TagAssociation, TagId, DEFAULT_TAG_COLOR, DEFAULT_WEIGHT, MAX_TAG_NAME_LEN,
};
pub use query::{ComponentQuery, EdgeFilter, PathQuery, PathResult, RelationshipSnapshot, TraversalResult};
pub use storage::{
    ConceptRegistry, GraphStore, InMemoryRegistry, OpenStore, PurgeReport, SqliteStore,
    StorageError, StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
