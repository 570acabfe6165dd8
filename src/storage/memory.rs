//! In-process concept registry

use super::traits::{ConceptRegistry, StorageError, StorageResult};
use crate::graph::{ConceptId, Laboratory, LaboratoryId};
use dashmap::DashMap;

/// Laboratories and their concepts held in memory
///
/// Stands in for the workspace layer when the graph is embedded in a
/// process that keeps concept records elsewhere, and in tests.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    laboratories: DashMap<LaboratoryId, Laboratory>,
    concepts: DashMap<ConceptId, LaboratoryId>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a laboratory, replacing one with the same ID
    pub fn upsert_laboratory(&self, laboratory: Laboratory) -> LaboratoryId {
        let id = laboratory.id.clone();
        self.laboratories.insert(id.clone(), laboratory);
        id
    }

    pub fn get_laboratory(&self, id: &LaboratoryId) -> Option<Laboratory> {
        self.laboratories.get(id).map(|r| r.clone())
    }

    /// Register a concept inside an existing laboratory
    pub fn register_concept(&self, id: ConceptId, laboratory: &LaboratoryId) -> StorageResult<()> {
        if !self.laboratories.contains_key(laboratory) {
            return Err(StorageError::LaboratoryNotFound(laboratory.to_string()));
        }
        match self.concepts.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(e) => {
                Err(StorageError::Conflict(format!("concept {}", e.key())))
            }
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(laboratory.clone());
                Ok(())
            }
        }
    }

    /// Forget a concept. Returns false if it was unknown.
    pub fn remove_concept(&self, id: &ConceptId) -> bool {
        self.concepts.remove(id).is_some()
    }

    /// Remove a laboratory and every concept it owns
    pub fn remove_laboratory(&self, id: &LaboratoryId) -> Option<Laboratory> {
        self.concepts.retain(|_, lab| lab != id);
        self.laboratories.remove(id).map(|(_, lab)| lab)
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }
}

impl ConceptRegistry for InMemoryRegistry {
    fn concept_exists(&self, id: &ConceptId) -> StorageResult<bool> {
        Ok(self.concepts.contains_key(id))
    }

    fn concept_laboratory(&self, id: &ConceptId) -> StorageResult<Option<LaboratoryId>> {
        Ok(self.concepts.get(id).map(|r| r.value().clone()))
    }

    fn concepts_in(&self, laboratory: &LaboratoryId) -> StorageResult<Vec<ConceptId>> {
        let mut ids: Vec<ConceptId> = self
            .concepts
            .iter()
            .filter(|r| r.value() == laboratory)
            .map(|r| r.key().clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn drop_laboratory(&self, laboratory: &LaboratoryId) -> StorageResult<bool> {
        Ok(self.remove_laboratory(laboratory).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_requires_known_laboratory() {
        let registry = InMemoryRegistry::new();
        let result = registry.register_concept(ConceptId::from("c1"), &LaboratoryId::from("nowhere"));
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_concept_is_rejected() {
        let registry = InMemoryRegistry::new();
        let lab = registry.upsert_laboratory(Laboratory::new("Philosophy"));
        registry.register_concept("c1".into(), &lab).unwrap();
        assert!(matches!(
            registry.register_concept("c1".into(), &lab),
            Err(StorageError::Conflict(_))
        ));
    }

    #[test]
    fn removing_laboratory_drops_its_concepts() {
        let registry = InMemoryRegistry::new();
        let lab_a = registry.upsert_laboratory(Laboratory::new("A"));
        let lab_b = registry.upsert_laboratory(Laboratory::new("B"));
        registry.register_concept("a1".into(), &lab_a).unwrap();
        registry.register_concept("a2".into(), &lab_a).unwrap();
        registry.register_concept("b1".into(), &lab_b).unwrap();

        assert_eq!(registry.concepts_in(&lab_a).unwrap().len(), 2);
        assert!(registry.remove_laboratory(&lab_a).is_some());

        assert_eq!(registry.concept_count(), 1);
        assert!(!registry.concept_exists(&"a1".into()).unwrap());
        assert_eq!(registry.concept_laboratory(&"b1".into()).unwrap(), Some(lab_b));
    }
}
