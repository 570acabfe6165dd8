//! Concept identifier assignment and validation

use super::concept::{ConceptId, LaboratoryId};
use super::engine::{GraphError, GraphResult};
use crate::storage::ConceptRegistry;
use std::sync::Arc;
use tracing::warn;

/// Gatekeeper between the graph and whatever owns concept records
///
/// Every identifier the graph is handed passes through here before it can
/// reach a relationship or tag association.
#[derive(Clone)]
pub struct IdentifierRegistry {
    registry: Arc<dyn ConceptRegistry>,
}

impl std::fmt::Debug for IdentifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierRegistry").finish_non_exhaustive()
    }
}

impl IdentifierRegistry {
    pub fn new(registry: Arc<dyn ConceptRegistry>) -> Self {
        Self { registry }
    }

    /// A fresh identifier not yet known to the registry
    pub fn assign(&self) -> GraphResult<ConceptId> {
        loop {
            let id = ConceptId::new();
            if !self.registry.concept_exists(&id)? {
                return Ok(id);
            }
        }
    }

    /// Reject empty identifiers and ones containing whitespace
    pub fn check_syntax(id: &ConceptId) -> GraphResult<()> {
        if id.is_well_formed() {
            Ok(())
        } else {
            Err(GraphError::InvalidArgument(format!("malformed concept id: {:?}", id.as_str())))
        }
    }

    /// Fails with `ConceptNotFound` unless the concept exists
    pub fn validate_exists(&self, id: &ConceptId) -> GraphResult<()> {
        Self::check_syntax(id)?;
        if self.registry.concept_exists(id)? {
            Ok(())
        } else {
            warn!(concept = %id, "unknown concept");
            Err(GraphError::ConceptNotFound(id.clone()))
        }
    }

    /// The laboratory that owns the concept
    pub fn laboratory_of(&self, id: &ConceptId) -> GraphResult<LaboratoryId> {
        Self::check_syntax(id)?;
        self.registry
            .concept_laboratory(id)?
            .ok_or_else(|| GraphError::ConceptNotFound(id.clone()))
    }

    pub fn concepts_in(&self, laboratory: &LaboratoryId) -> GraphResult<Vec<ConceptId>> {
        Ok(self.registry.concepts_in(laboratory)?)
    }

    pub fn drop_laboratory(&self, laboratory: &LaboratoryId) -> GraphResult<bool> {
        Ok(self.registry.drop_laboratory(laboratory)?)
    }
}
