//! Point-in-time view of the active relationships

use crate::graph::{ConceptId, ConceptRelationship};
use std::collections::HashMap;

/// Active relationships indexed by the concepts they can be followed from
///
/// A directed edge is listed under its source only. A bidirectional edge is
/// listed under both endpoints, so queries see the effective undirected
/// graph while storage stays directed.
#[derive(Debug, Clone, Default)]
pub struct RelationshipSnapshot {
    relationships: Vec<ConceptRelationship>,
    navigable: HashMap<ConceptId, Vec<usize>>,
}

impl RelationshipSnapshot {
    /// Build the index. Inactive relationships are ignored.
    pub fn new(relationships: Vec<ConceptRelationship>) -> Self {
        let relationships: Vec<_> = relationships.into_iter().filter(|r| r.is_active).collect();
        let mut navigable: HashMap<ConceptId, Vec<usize>> = HashMap::new();

        for (index, rel) in relationships.iter().enumerate() {
            navigable.entry(rel.source.clone()).or_default().push(index);
            if rel.is_bidirectional {
                navigable.entry(rel.target.clone()).or_default().push(index);
            }
        }

        Self {
            relationships,
            navigable,
        }
    }

    /// Edges that can be followed from `concept`, each paired with the
    /// concept it leads to
    pub fn edges_from<'a>(
        &'a self,
        concept: &ConceptId,
    ) -> impl Iterator<Item = (&'a ConceptRelationship, &'a ConceptId)> + 'a {
        let concept = concept.clone();
        self.navigable
            .get(&concept)
            .into_iter()
            .flatten()
            .filter_map(move |&i| {
                let rel = &self.relationships[i];
                rel.other_end(&concept).map(|to| (rel, to))
            })
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::graph::{Actor, RelationshipId, RelationshipType, DEFAULT_WEIGHT};
    use chrono::Utc;

    pub(crate) fn rel(id: i64, source: &str, target: &str, bidirectional: bool) -> ConceptRelationship {
        let now = Utc::now();
        ConceptRelationship {
            id: RelationshipId::from_raw(id),
            source: ConceptId::from(source),
            target: ConceptId::from(target),
            relationship_type: RelationshipType::Semantic,
            description: None,
            strength: DEFAULT_WEIGHT,
            confidence: DEFAULT_WEIGHT,
            created_by: Actor::System,
            is_validated: false,
            is_bidirectional: bidirectional,
            access_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn reachable(snapshot: &RelationshipSnapshot, from: &str) -> Vec<String> {
        let mut out: Vec<_> = snapshot
            .edges_from(&from.into())
            .map(|(_, to)| to.to_string())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn bidirectional_edges_are_indexed_at_both_ends() {
        let snapshot = RelationshipSnapshot::new(vec![rel(1, "a", "b", true), rel(2, "b", "c", false)]);

        assert_eq!(reachable(&snapshot, "a"), vec!["b"]);
        assert_eq!(reachable(&snapshot, "b"), vec!["a", "c"]);
        assert!(reachable(&snapshot, "c").is_empty());
    }

    #[test]
    fn inactive_edges_are_dropped() {
        let mut dead = rel(1, "a", "b", true);
        dead.is_active = false;
        let snapshot = RelationshipSnapshot::new(vec![dead]);

        assert!(snapshot.is_empty());
        assert!(reachable(&snapshot, "a").is_empty());
    }
}
