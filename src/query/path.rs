//! Path finding over the effective edge set

use super::snapshot::RelationshipSnapshot;
use super::types::{EdgeFilter, PathResult};
use crate::graph::{ConceptId, RelationshipId};
use std::collections::{HashMap, HashSet, VecDeque};

/// Query for finding paths between concepts
#[derive(Debug, Clone)]
pub struct PathQuery {
    /// Source concept
    pub source: ConceptId,
    /// Target concept
    pub target: ConceptId,
    /// Maximum path length to search
    pub max_length: usize,
    /// Which edges may be followed
    pub filter: EdgeFilter,
}

impl PathQuery {
    /// Create a new path query between two concepts
    pub fn between(source: ConceptId, target: ConceptId) -> Self {
        Self {
            source,
            target,
            max_length: 10,
            filter: EdgeFilter::any(),
        }
    }

    /// Set maximum path length
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn filter(mut self, filter: EdgeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Execute the path query (BFS for shortest path)
    pub fn execute(&self, snapshot: &RelationshipSnapshot) -> PathResult {
        if self.source == self.target {
            return PathResult::found(vec![self.source.clone()], vec![]);
        }

        let mut visited: HashSet<ConceptId> = HashSet::new();
        let mut queue: VecDeque<ConceptId> = VecDeque::new();
        let mut predecessors: HashMap<ConceptId, (ConceptId, RelationshipId)> = HashMap::new();

        visited.insert(self.source.clone());
        queue.push_back(self.source.clone());

        let mut depth = 0;

        while !queue.is_empty() && depth < self.max_length {
            let level_size = queue.len();

            for _ in 0..level_size {
                let Some(current) = queue.pop_front() else {
                    break;
                };

                for (rel, neighbor) in snapshot.edges_from(&current) {
                    if !self.filter.matches(rel) || visited.contains(neighbor) {
                        continue;
                    }

                    visited.insert(neighbor.clone());
                    predecessors.insert(neighbor.clone(), (current.clone(), rel.id));

                    if neighbor == &self.target {
                        return self.reconstruct_path(&predecessors);
                    }
                    queue.push_back(neighbor.clone());
                }
            }

            depth += 1;
        }

        PathResult::not_found()
    }

    /// Reconstruct the path from predecessors map
    fn reconstruct_path(&self, predecessors: &HashMap<ConceptId, (ConceptId, RelationshipId)>) -> PathResult {
        let mut path = vec![self.target.clone()];
        let mut relationships = Vec::new();

        // Walk backwards from target to source
        let mut current = &self.target;
        while let Some((pred, rel)) = predecessors.get(current) {
            path.push(pred.clone());
            relationships.push(*rel);
            current = pred;
        }

        path.reverse();
        relationships.reverse();

        PathResult::found(path, relationships)
    }
}
