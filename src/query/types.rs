//! Query filters and result structures

use crate::graph::{ConceptId, ConceptRelationship, RelationshipId, RelationshipType};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Which edges a query may follow
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeFilter {
    /// Allowed relationship types; `None` allows every type
    pub relationship_types: Option<HashSet<RelationshipType>>,
    /// Edges weaker than this are skipped
    pub min_strength: f32,
}

impl Default for EdgeFilter {
    fn default() -> Self {
        Self {
            relationship_types: None,
            min_strength: 0.0,
        }
    }
}

impl EdgeFilter {
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to the given types. An empty list means every type.
    pub fn with_types(mut self, types: impl IntoIterator<Item = RelationshipType>) -> Self {
        let types: HashSet<_> = types.into_iter().collect();
        self.relationship_types = if types.is_empty() { None } else { Some(types) };
        self
    }

    pub fn min_strength(mut self, min_strength: f32) -> Self {
        self.min_strength = min_strength;
        self
    }

    pub fn matches(&self, relationship: &ConceptRelationship) -> bool {
        if let Some(ref types) = self.relationship_types {
            if !types.contains(&relationship.relationship_type) {
                return false;
            }
        }
        relationship.strength >= self.min_strength
    }
}

/// Result of a component traversal
#[derive(Debug, Clone, Serialize)]
pub struct TraversalResult {
    /// Starting concept
    pub origin: ConceptId,
    /// Concepts discovered at each depth level
    /// Level 0 = origin, Level 1 = immediate neighbors, etc.
    pub levels: Vec<Vec<ConceptId>>,
    /// Relationships followed to reach each discovered concept
    pub relationships: Vec<RelationshipId>,
}

impl TraversalResult {
    pub fn new(origin: ConceptId) -> Self {
        Self {
            levels: vec![vec![origin.clone()]],
            origin,
            relationships: Vec::new(),
        }
    }

    /// Every concept reached, origin included
    pub fn members(&self) -> BTreeSet<ConceptId> {
        self.levels.iter().flatten().cloned().collect()
    }

    /// Get concepts at a specific depth
    pub fn at_depth(&self, depth: usize) -> &[ConceptId] {
        self.levels.get(depth).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Get the maximum depth reached
    pub fn max_depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }
}

/// Result of a path query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathResult {
    /// Whether a path was found
    pub found: bool,
    /// Concepts in the path from source to target (inclusive)
    pub path: Vec<ConceptId>,
    /// Relationships in the path
    pub relationships: Vec<RelationshipId>,
    /// Path length (number of hops)
    pub length: usize,
}

impl PathResult {
    pub fn not_found() -> Self {
        Self {
            found: false,
            path: Vec::new(),
            relationships: Vec::new(),
            length: 0,
        }
    }

    pub fn found(path: Vec<ConceptId>, relationships: Vec<RelationshipId>) -> Self {
        let length = relationships.len();
        Self {
            found: true,
            path,
            relationships,
            length,
        }
    }
}
