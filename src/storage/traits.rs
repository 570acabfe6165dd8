//! Storage trait definitions

use crate::graph::{
    ConceptId, ConceptRelationship, HierarchyError, LaboratoryId, NewRelationship, NewTag,
    RelationshipId, Tag, TagArena, TagAssociation, TagId,
};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Laboratory not found: {0}")]
    LaboratoryNotFound(String),

    #[error("Tag not found: {0}")]
    TagNotFound(TagId),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What a purge or erase touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PurgeReport {
    /// Relationships deactivated (purge) or deleted (erase)
    pub relationships: usize,
    /// Tag associations removed
    pub tag_associations: usize,
    /// Tags deleted
    pub tags: usize,
}

/// Source of truth for which concepts exist and where they live
///
/// Implemented by whatever owns laboratory and concept records. The graph
/// store calls it before every mutation that names a concept.
pub trait ConceptRegistry: Send + Sync {
    /// Whether the concept exists
    fn concept_exists(&self, id: &ConceptId) -> StorageResult<bool>;

    /// The laboratory owning the concept, if it exists
    fn concept_laboratory(&self, id: &ConceptId) -> StorageResult<Option<LaboratoryId>>;

    /// All concepts owned by a laboratory
    fn concepts_in(&self, laboratory: &LaboratoryId) -> StorageResult<Vec<ConceptId>>;

    /// Drop a laboratory and its concepts. Returns false if it was unknown.
    fn drop_laboratory(&self, laboratory: &LaboratoryId) -> StorageResult<bool>;
}

/// Trait for concept graph storage backends
///
/// Every method is atomic on its own: it either fully applies or leaves the
/// store unchanged. Implementations must be thread-safe (Send + Sync).
pub trait GraphStore: Send + Sync {
    // === Relationship Operations ===

    /// Insert a relationship, or update the one with the same
    /// `(source, target, relationship_type)` in place. Returns its ID.
    fn upsert_relationship(&self, relationship: &NewRelationship) -> StorageResult<RelationshipId>;

    /// Load a relationship by ID, active or not
    fn load_relationship(&self, id: RelationshipId) -> StorageResult<Option<ConceptRelationship>>;

    /// Set the active flag. Returns `None` for an unknown ID, otherwise
    /// whether the flag changed.
    fn set_relationship_active(&self, id: RelationshipId, active: bool) -> StorageResult<Option<bool>>;

    /// Mark a relationship as human-validated. Returns false for an unknown ID.
    fn set_relationship_validated(&self, id: RelationshipId, validated: bool) -> StorageResult<bool>;

    /// Relationships with the concept at either end, ordered by
    /// `created_at` then ID
    fn relationships_touching(
        &self,
        concept: &ConceptId,
        include_inactive: bool,
    ) -> StorageResult<Vec<ConceptRelationship>>;

    /// Relationships stored with the concept as target, same ordering
    fn relationships_into(
        &self,
        concept: &ConceptId,
        include_inactive: bool,
    ) -> StorageResult<Vec<ConceptRelationship>>;

    /// Every active relationship, read in a single statement
    fn active_relationships(&self) -> StorageResult<Vec<ConceptRelationship>>;

    /// Bump the access counter of each listed relationship by one.
    /// Returns how many rows were updated.
    fn increment_access(&self, ids: &[RelationshipId]) -> StorageResult<usize>;

    // === Tag Operations ===

    /// Create a tag, checking that its parent exists and that its name is
    /// free within its scope (`Conflict` otherwise)
    fn insert_tag(&self, tag: &NewTag) -> StorageResult<TagId>;

    /// Load a tag by ID
    fn load_tag(&self, id: TagId) -> StorageResult<Option<Tag>>;

    /// List active tags, optionally only those visible to a laboratory
    /// (its own plus global ones)
    fn list_tags(&self, laboratory: Option<&LaboratoryId>) -> StorageResult<Vec<Tag>>;

    /// Set a tag's active flag. Returns None if the tag does not exist,
    /// otherwise whether the flag changed.
    fn set_tag_active(&self, id: TagId, active: bool) -> StorageResult<Option<bool>>;

    /// Names and parent links of every tag
    fn load_tag_arena(&self) -> StorageResult<TagArena>;

    /// Change a tag's parent, refusing changes that would form a cycle
    fn set_tag_parent(&self, tag: TagId, parent: Option<TagId>) -> StorageResult<()>;

    /// Insert or update an association. Returns true if it was newly created,
    /// in which case the tag's usage count was incremented.
    fn upsert_tag_association(&self, association: &TagAssociation) -> StorageResult<bool>;

    /// Delete an association, decrementing usage (floored at zero).
    /// Returns false if there was nothing to delete.
    fn delete_tag_association(&self, concept: &ConceptId, tag: TagId) -> StorageResult<bool>;

    /// Associations of a concept, oldest first
    fn tag_associations_for(&self, concept: &ConceptId) -> StorageResult<Vec<TagAssociation>>;

    /// Concepts carrying a tag
    fn concepts_tagged(&self, tag: TagId) -> StorageResult<Vec<ConceptId>>;

    // === Cascades ===

    /// Deactivate every relationship referencing the concept and remove its
    /// tag associations
    fn purge_concept(&self, concept: &ConceptId) -> StorageResult<PurgeReport>;

    /// In one transaction, hard-delete every relationship and tag
    /// association referencing any of the concepts, then the laboratory's
    /// own tags and their associations. Children outside the laboratory
    /// become roots.
    fn erase_laboratory(&self, laboratory: &LaboratoryId, concepts: &[ConceptId]) -> StorageResult<PurgeReport>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
