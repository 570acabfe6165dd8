//! ConceptGraph: the main entry point for the concept graph

use super::concept::{ConceptId, LaboratoryId};
use super::registry::IdentifierRegistry;
use super::relationship::{
    clamp_unit, Actor, ConceptRelationship, RelationshipDraft, RelationshipId, RelationshipView,
};
use super::tag::{HierarchyError, NewTag, Tag, TagAssociation, TagId};
use crate::config::GraphConfig;
use crate::query::{ComponentQuery, EdgeFilter, PathQuery, PathResult, RelationshipSnapshot, TraversalResult};
use crate::storage::{ConceptRegistry, GraphStore, PurgeReport, StorageError};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur in concept graph operations
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Concept not found: {0}")]
    ConceptNotFound(ConceptId),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(RelationshipId),

    #[error("Tag not found: {0}")]
    TagNotFound(TagId),

    #[error("Laboratory not found: {0}")]
    LaboratoryNotFound(LaboratoryId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Tag {tag} cannot take {parent} as parent: it would become its own ancestor")]
    CycleWouldForm { tag: TagId, parent: TagId },

    #[error("Tag hierarchy loops back on itself at tag {0}")]
    CycleDetected(TagId),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl GraphError {
    /// Any of the unknown-identifier variants
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ConceptNotFound(_)
                | Self::RelationshipNotFound(_)
                | Self::TagNotFound(_)
                | Self::LaboratoryNotFound(_)
        )
    }
}

impl From<HierarchyError> for GraphError {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::CycleWouldForm { tag, parent } => Self::CycleWouldForm { tag, parent },
            HierarchyError::CycleDetected(tag) => Self::CycleDetected(tag),
            HierarchyError::UnknownTag(tag) => Self::TagNotFound(tag),
        }
    }
}

impl From<StorageError> for GraphError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Hierarchy(h) => h.into(),
            StorageError::TagNotFound(tag) => Self::TagNotFound(tag),
            StorageError::LaboratoryNotFound(lab) => Self::LaboratoryNotFound(LaboratoryId::from(lab)),
            other => Self::Storage(other),
        }
    }
}

/// Result type for concept graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Convert a caller-supplied depth, rejecting negative values
fn depth_bound(max_depth: i64) -> GraphResult<usize> {
    usize::try_from(max_depth)
        .map_err(|_| GraphError::InvalidArgument(format!("max_depth must not be negative, got {}", max_depth)))
}

/// The concept relationship graph and tag associations
///
/// Wraps a `GraphStore` for persistence and an `IdentifierRegistry` for
/// concept existence. Every mutation validates the identifiers it is given
/// before touching the store; traversals run over a snapshot read in one
/// statement.
pub struct ConceptGraph {
    store: Arc<dyn GraphStore>,
    identifiers: IdentifierRegistry,
    config: GraphConfig,
}

impl std::fmt::Debug for ConceptGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConceptGraph")
            .field("identifiers", &self.identifiers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConceptGraph {
    /// Create a graph with default configuration
    pub fn new(store: Arc<dyn GraphStore>, registry: Arc<dyn ConceptRegistry>) -> Self {
        Self {
            store,
            identifiers: IdentifierRegistry::new(registry),
            config: GraphConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn identifiers(&self) -> &IdentifierRegistry {
        &self.identifiers
    }

    // === Relationships ===

    /// Assert a relationship, inserting it or updating the existing one with
    /// the same source, target and type. Returns the relationship's ID.
    ///
    /// Strength and confidence are clamped into [0, 1]; unset or NaN values
    /// take the configured defaults. Re-asserting a deactivated relationship
    /// reactivates it.
    pub fn assert_relationship(&self, draft: RelationshipDraft) -> GraphResult<RelationshipId> {
        IdentifierRegistry::check_syntax(&draft.source)?;
        IdentifierRegistry::check_syntax(&draft.target)?;
        if draft.source == draft.target {
            warn!(concept = %draft.source, "rejected self-loop");
            return Err(GraphError::InvalidArgument(format!(
                "a concept cannot relate to itself: {}",
                draft.source
            )));
        }
        self.identifiers.validate_exists(&draft.source)?;
        self.identifiers.validate_exists(&draft.target)?;

        let relationship = draft.resolve(self.config.default_strength, self.config.default_confidence);
        let id = self.store.upsert_relationship(&relationship)?;

        info!(
            id = %id,
            source = %relationship.source,
            target = %relationship.target,
            relationship_type = %relationship.relationship_type,
            strength = relationship.strength,
            "asserted relationship"
        );
        Ok(id)
    }

    /// Soft-delete a relationship. Returns whether it was active before.
    pub fn deactivate(&self, id: RelationshipId) -> GraphResult<bool> {
        match self.store.set_relationship_active(id, false)? {
            Some(changed) => {
                info!(id = %id, changed, "deactivated relationship");
                Ok(changed)
            }
            None => Err(GraphError::RelationshipNotFound(id)),
        }
    }

    pub fn get_relationship(&self, id: RelationshipId) -> GraphResult<ConceptRelationship> {
        self.store
            .load_relationship(id)?
            .ok_or(GraphError::RelationshipNotFound(id))
    }

    /// Mark a relationship as confirmed by a human
    pub fn validate_relationship(&self, id: RelationshipId) -> GraphResult<()> {
        if !self.store.set_relationship_validated(id, true)? {
            return Err(GraphError::RelationshipNotFound(id));
        }
        info!(id = %id, "validated relationship");
        Ok(())
    }

    /// Relationships navigable from a concept, oriented so the concept is on
    /// the "from" side: those it is the source of, plus bidirectional ones it
    /// is the target of. Oldest first.
    ///
    /// Every returned active relationship has its access count bumped; the
    /// returned records show the count as read.
    pub fn list_outgoing(&self, concept: &ConceptId, include_inactive: bool) -> GraphResult<Vec<RelationshipView>> {
        self.identifiers.validate_exists(concept)?;

        let views: Vec<RelationshipView> = self
            .store
            .relationships_touching(concept, include_inactive)?
            .iter()
            .filter_map(|rel| rel.oriented_from(concept))
            .collect();

        let ids: Vec<RelationshipId> = views
            .iter()
            .filter(|v| v.relationship.is_active)
            .map(|v| v.relationship.id)
            .collect();
        self.record_access(&ids)?;

        debug!(concept = %concept, count = views.len(), "listed outgoing relationships");
        Ok(views)
    }

    /// Relationships stored with the concept as target, as stored
    pub fn list_incoming(&self, concept: &ConceptId, include_inactive: bool) -> GraphResult<Vec<ConceptRelationship>> {
        self.identifiers.validate_exists(concept)?;
        let incoming = self.store.relationships_into(concept, include_inactive)?;
        debug!(concept = %concept, count = incoming.len(), "listed incoming relationships");
        Ok(incoming)
    }

    /// Bump a relationship's access count by one
    pub fn increment_access(&self, id: RelationshipId) -> GraphResult<()> {
        if self.store.increment_access(&[id])? == 0 {
            return Err(GraphError::RelationshipNotFound(id));
        }
        Ok(())
    }

    fn record_access(&self, ids: &[RelationshipId]) -> GraphResult<()> {
        let unique: BTreeSet<RelationshipId> = ids.iter().copied().collect();
        let unique: Vec<RelationshipId> = unique.into_iter().collect();
        self.store.increment_access(&unique)?;
        Ok(())
    }

    // === Queries ===

    fn snapshot(&self) -> GraphResult<RelationshipSnapshot> {
        Ok(RelationshipSnapshot::new(self.store.active_relationships()?))
    }

    /// Concepts one active hop away that pass the filter
    pub fn neighbors(&self, concept: &ConceptId, filter: &EdgeFilter) -> GraphResult<BTreeSet<ConceptId>> {
        self.identifiers.validate_exists(concept)?;

        let mut used = Vec::new();
        let mut neighbors = BTreeSet::new();
        for rel in self.store.relationships_touching(concept, false)? {
            if !filter.matches(&rel) {
                continue;
            }
            if let Some(to) = rel.other_end(concept) {
                neighbors.insert(to.clone());
                used.push(rel.id);
            }
        }
        self.record_access(&used)?;

        debug!(concept = %concept, count = neighbors.len(), "computed neighbors");
        Ok(neighbors)
    }

    /// Breadth-first traversal with explicit filter and depth
    pub fn traverse(&self, query: &ComponentQuery) -> GraphResult<TraversalResult> {
        self.identifiers.validate_exists(&query.origin)?;
        let result = query.execute(&self.snapshot()?);
        self.record_access(&result.relationships)?;

        debug!(
            origin = %query.origin,
            max_depth = query.max_depth,
            reached = result.levels.iter().map(Vec::len).sum::<usize>(),
            "traversed component"
        );
        Ok(result)
    }

    /// Concepts reachable within `max_depth` hops, the start included
    pub fn connected_component(&self, concept: &ConceptId, max_depth: i64) -> GraphResult<BTreeSet<ConceptId>> {
        let query = ComponentQuery::from(concept.clone()).depth(depth_bound(max_depth)?);
        Ok(self.traverse(&query)?.members())
    }

    /// Shortest route within `max_depth` hops; a miss is not an error
    pub fn shortest_path(&self, from: &ConceptId, to: &ConceptId, max_depth: i64) -> GraphResult<PathResult> {
        let max_length = depth_bound(max_depth)?;
        self.identifiers.validate_exists(from)?;
        self.identifiers.validate_exists(to)?;

        let result = PathQuery::between(from.clone(), to.clone())
            .max_length(max_length)
            .execute(&self.snapshot()?);
        self.record_access(&result.relationships)?;

        debug!(from = %from, to = %to, found = result.found, length = result.length, "searched path");
        Ok(result)
    }

    pub fn path_exists(&self, from: &ConceptId, to: &ConceptId, max_depth: i64) -> GraphResult<bool> {
        Ok(self.shortest_path(from, to, max_depth)?.found)
    }

    // === Tags ===

    /// Create a tag. Names are unique within their laboratory (or among
    /// global tags), and a parent must be visible from the new tag's scope.
    pub fn create_tag(&self, tag: NewTag) -> GraphResult<Tag> {
        tag.check().map_err(GraphError::InvalidArgument)?;

        let name = tag.name.trim();
        if let Some(parent) = tag.parent_id {
            let parent = self.get_tag(parent)?;
            check_scope(&parent, tag.laboratory_id.as_ref())?;
        }

        let id = match self.store.insert_tag(&tag) {
            Ok(id) => id,
            Err(StorageError::Conflict(_)) => {
                warn!(tag = %name, laboratory = ?tag.laboratory_id, "duplicate tag name");
                return Err(GraphError::InvalidArgument(format!("tag already exists: {}", name)));
            }
            Err(err) => return Err(err.into()),
        };
        info!(id = %id, tag = %name, laboratory = ?tag.laboratory_id, "created tag");
        self.get_tag(id)
    }

    pub fn get_tag(&self, id: TagId) -> GraphResult<Tag> {
        self.store.load_tag(id)?.ok_or(GraphError::TagNotFound(id))
    }

    /// Active tags, all or only those visible to a laboratory
    pub fn list_tags(&self, laboratory: Option<&LaboratoryId>) -> GraphResult<Vec<Tag>> {
        Ok(self.store.list_tags(laboratory)?)
    }

    /// Retire or restore a tag. Inactive tags keep their associations but
    /// are not listed and cannot be assigned. Returns whether the flag changed.
    pub fn set_tag_active(&self, tag: TagId, active: bool) -> GraphResult<bool> {
        match self.store.set_tag_active(tag, active)? {
            Some(changed) => {
                info!(tag = %tag, active, changed, "set tag active");
                Ok(changed)
            }
            None => Err(GraphError::TagNotFound(tag)),
        }
    }

    /// Move a tag under a new parent, or make it a root with `None`
    pub fn set_tag_parent(&self, tag: TagId, parent: Option<TagId>) -> GraphResult<()> {
        let child = self.get_tag(tag)?;
        if let Some(parent) = parent {
            check_scope(&self.get_tag(parent)?, child.laboratory_id.as_ref())?;
        }

        if let Err(err) = self.store.set_tag_parent(tag, parent) {
            warn!(tag = %tag, parent = ?parent, error = %err, "rejected tag parent change");
            return Err(err.into());
        }
        info!(tag = %tag, parent = ?parent, "set tag parent");
        Ok(())
    }

    /// Slash-joined name from the root tag down, e.g. "science/physics"
    pub fn resolve_full_name(&self, tag: TagId) -> GraphResult<String> {
        let arena = self.store.load_tag_arena()?;
        arena.full_name(tag).map_err(|err| {
            if matches!(err, HierarchyError::CycleDetected(_)) {
                warn!(tag = %tag, "tag hierarchy is corrupt");
            }
            err.into()
        })
    }

    /// Tag a concept, or update confidence and assigner of an existing
    /// association. Returns true if the association is new.
    pub fn assign_tag(
        &self,
        concept: &ConceptId,
        tag: TagId,
        confidence: Option<f32>,
        assigned_by: Actor,
    ) -> GraphResult<bool> {
        let concept_lab = self.identifiers.laboratory_of(concept)?;
        let tag_record = self.get_tag(tag)?;
        if !tag_record.is_active {
            warn!(concept = %concept, tag = %tag, "tag is inactive");
            return Err(GraphError::InvalidArgument(format!("tag {} is inactive", tag)));
        }
        if let Some(ref tag_lab) = tag_record.laboratory_id {
            if tag_lab != &concept_lab {
                warn!(concept = %concept, tag = %tag, "tag belongs to another laboratory");
                return Err(GraphError::InvalidArgument(format!(
                    "tag {} belongs to laboratory {}, concept {} to {}",
                    tag, tag_lab, concept, concept_lab
                )));
            }
        }

        let default = self.config.default_tag_confidence;
        let association = TagAssociation {
            concept_id: concept.clone(),
            tag_id: tag,
            confidence: clamp_unit(confidence.unwrap_or(default), default),
            assigned_by,
            created_at: Utc::now(),
        };
        let created = self.store.upsert_tag_association(&association)?;

        info!(concept = %concept, tag = %tag, created, "assigned tag");
        Ok(created)
    }

    /// Untag a concept. Returns false when there was nothing to remove.
    pub fn remove_tag(&self, concept: &ConceptId, tag: TagId) -> GraphResult<bool> {
        IdentifierRegistry::check_syntax(concept)?;
        let removed = self.store.delete_tag_association(concept, tag)?;
        if removed {
            info!(concept = %concept, tag = %tag, "removed tag");
        }
        Ok(removed)
    }

    /// Tag associations of a concept, oldest first
    pub fn tags_of(&self, concept: &ConceptId) -> GraphResult<Vec<TagAssociation>> {
        self.identifiers.validate_exists(concept)?;
        Ok(self.store.tag_associations_for(concept)?)
    }

    pub fn concepts_tagged(&self, tag: TagId) -> GraphResult<Vec<ConceptId>> {
        self.get_tag(tag)?;
        Ok(self.store.concepts_tagged(tag)?)
    }

    // === Cascades ===

    /// Detach a concept from the graph: deactivate every relationship that
    /// references it and remove its tag associations. The concept itself
    /// need not exist any more.
    pub fn purge_concept(&self, concept: &ConceptId) -> GraphResult<PurgeReport> {
        IdentifierRegistry::check_syntax(concept)?;
        let report = self.store.purge_concept(concept)?;
        info!(
            concept = %concept,
            relationships = report.relationships,
            tag_associations = report.tag_associations,
            "purged concept"
        );
        Ok(report)
    }

    /// Erase everything a laboratory owns: relationships and tag
    /// associations of its concepts, its own tags, and finally the
    /// laboratory record in the registry
    pub fn purge_laboratory(&self, laboratory: &LaboratoryId) -> GraphResult<PurgeReport> {
        let concepts = self.identifiers.concepts_in(laboratory)?;

        let report = self.store.erase_laboratory(laboratory, &concepts)?;

        if !self.identifiers.drop_laboratory(laboratory)? {
            debug!(laboratory = %laboratory, "laboratory already gone from registry");
        }

        info!(
            laboratory = %laboratory,
            concepts = concepts.len(),
            relationships = report.relationships,
            tag_associations = report.tag_associations,
            tags = report.tags,
            "purged laboratory"
        );
        Ok(report)
    }
}

/// A laboratory-scoped tag is only visible inside its own laboratory
fn check_scope(parent: &Tag, laboratory: Option<&LaboratoryId>) -> GraphResult<()> {
    match (&parent.laboratory_id, laboratory) {
        (None, _) => Ok(()),
        (Some(owner), Some(lab)) if owner == lab => Ok(()),
        (Some(owner), _) => Err(GraphError::InvalidArgument(format!(
            "tag {} belongs to laboratory {} and cannot be a parent here",
            parent.id, owner
        ))),
    }
}
