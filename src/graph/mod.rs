//! Core graph data structures

mod concept;
mod engine;
mod registry;
mod relationship;
mod tag;

#[cfg(test)]
mod tests;

pub use concept::{ConceptId, Laboratory, LaboratoryId};
pub use engine::{ConceptGraph, GraphError, GraphResult};
pub use registry::IdentifierRegistry;
pub use relationship::{
    clamp_unit, Actor, ConceptRelationship, NewRelationship, RelationshipDraft, RelationshipId,
    RelationshipType, RelationshipView, DEFAULT_WEIGHT,
};
pub use tag::{
    HierarchyError, NewTag, Tag, TagArena, TagAssociation, TagId, DEFAULT_TAG_COLOR,
    MAX_TAG_NAME_LEN,
};
