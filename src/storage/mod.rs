//! Storage backends for the concept graph
//!
//! Persistence goes through the `GraphStore` trait; `SqliteStore` is the
//! primary implementation. Concept existence comes from a `ConceptRegistry`,
//! either the SQLite store itself or the in-process `InMemoryRegistry`.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryRegistry;
pub use sqlite::SqliteStore;
pub use traits::{
    ConceptRegistry, GraphStore, OpenStore, PurgeReport, StorageError, StorageResult,
};
