//! Connected-component traversal

use super::snapshot::RelationshipSnapshot;
use super::types::{EdgeFilter, TraversalResult};
use crate::graph::ConceptId;
use std::collections::HashSet;

/// Breadth-first expansion from a starting concept
#[derive(Debug, Clone)]
pub struct ComponentQuery {
    /// Starting concept
    pub origin: ConceptId,
    /// Maximum depth to traverse (0 = origin only, 1 = immediate neighbors, etc.)
    pub max_depth: usize,
    /// Which edges may be followed
    pub filter: EdgeFilter,
}

impl ComponentQuery {
    /// Create a new traversal query from a starting concept
    pub fn from(origin: ConceptId) -> Self {
        Self {
            origin,
            max_depth: 1,
            filter: EdgeFilter::any(),
        }
    }

    /// Set the maximum traversal depth
    pub fn depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn filter(mut self, filter: EdgeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Execute the traversal against a snapshot
    ///
    /// Each concept is visited once, so cycles terminate regardless of depth.
    pub fn execute(&self, snapshot: &RelationshipSnapshot) -> TraversalResult {
        let mut result = TraversalResult::new(self.origin.clone());

        let mut visited: HashSet<ConceptId> = HashSet::new();
        visited.insert(self.origin.clone());
        let mut current_level: Vec<ConceptId> = vec![self.origin.clone()];

        for _depth in 0..self.max_depth {
            if current_level.is_empty() {
                break;
            }

            let mut next_level: Vec<ConceptId> = Vec::new();

            for concept in &current_level {
                for (rel, neighbor) in snapshot.edges_from(concept) {
                    if !self.filter.matches(rel) || visited.contains(neighbor) {
                        continue;
                    }

                    visited.insert(neighbor.clone());
                    next_level.push(neighbor.clone());
                    result.relationships.push(rel.id);
                }
            }

            if !next_level.is_empty() {
                result.levels.push(next_level.clone());
            }
            current_level = next_level;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RelationshipType;
    use crate::query::snapshot::tests::rel;

    fn names(result: &TraversalResult) -> Vec<String> {
        result.members().into_iter().map(|c| c.to_string()).collect()
    }

    /// x <-> y <-> z, plus a directed z -> w
    fn chain() -> RelationshipSnapshot {
        RelationshipSnapshot::new(vec![
            rel(1, "x", "y", true),
            rel(2, "y", "z", true),
            rel(3, "z", "w", false),
        ])
    }

    #[test]
    fn depth_zero_is_origin_only() {
        let result = ComponentQuery::from("x".into()).depth(0).execute(&chain());
        assert_eq!(names(&result), vec!["x"]);
        assert!(result.relationships.is_empty());
    }

    #[test]
    fn depth_two_reaches_end_of_chain() {
        let result = ComponentQuery::from("x".into()).depth(2).execute(&chain());
        assert_eq!(names(&result), vec!["x", "y", "z"]);
        assert_eq!(result.max_depth(), 2);
        assert_eq!(result.at_depth(2).len(), 1);
    }

    #[test]
    fn directed_edge_is_not_followed_backwards() {
        let result = ComponentQuery::from("w".into()).depth(5).execute(&chain());
        assert_eq!(names(&result), vec!["w"]);

        let result = ComponentQuery::from("z".into()).depth(1).execute(&chain());
        assert_eq!(names(&result), vec!["w", "y", "z"]);
    }

    #[test]
    fn cycle_terminates() {
        let snapshot = RelationshipSnapshot::new(vec![
            rel(1, "a", "b", false),
            rel(2, "b", "c", false),
            rel(3, "c", "a", false),
        ]);
        let result = ComponentQuery::from("a".into()).depth(100).execute(&snapshot);
        assert_eq!(names(&result), vec!["a", "b", "c"]);
        assert_eq!(result.relationships.len(), 2);
    }

    #[test]
    fn filter_blocks_edges() {
        let mut weak = rel(1, "a", "b", true);
        weak.strength = 0.1;
        let mut causal = rel(2, "a", "c", true);
        causal.relationship_type = RelationshipType::Causal;
        let snapshot = RelationshipSnapshot::new(vec![weak, causal]);

        let result = ComponentQuery::from("a".into())
            .depth(1)
            .filter(EdgeFilter::any().min_strength(0.2))
            .execute(&snapshot);
        assert_eq!(names(&result), vec!["a", "c"]);

        let result = ComponentQuery::from("a".into())
            .depth(1)
            .filter(EdgeFilter::any().with_types([RelationshipType::Semantic]))
            .execute(&snapshot);
        assert_eq!(names(&result), vec!["a", "b"]);
    }
}
