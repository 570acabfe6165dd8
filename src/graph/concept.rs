//! Concept and laboratory identifiers
//!
//! Concepts themselves are owned by the laboratory workspace layer. The graph
//! only ever sees their identifiers, so both IDs are opaque strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a concept
///
/// Serializes as a plain string (UUID or a zettel-style ID like "202501280001")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptId(String);

impl ConceptId {
    /// Create a new random ConceptId (UUID-based)
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a ConceptId from an existing string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is syntactically usable: non-empty, no whitespace
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && !self.0.chars().any(char::is_whitespace)
    }
}

impl Default for ConceptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConceptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConceptId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConceptId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identifier for a laboratory workspace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaboratoryId(String);

impl LaboratoryId {
    /// Create a new random LaboratoryId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LaboratoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LaboratoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LaboratoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LaboratoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An isolated knowledge-domain workspace
///
/// Only the fields the graph needs to scope concepts and tags; colors, icons
/// and the rest of the workspace record live with the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Laboratory {
    pub id: LaboratoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Laboratory {
    /// Create a new laboratory with a random ID
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LaboratoryId::new(),
            name: name.into(),
            description: None,
            created_at: Utc::now(),
        }
    }

    /// Create a laboratory with a specific ID
    pub fn with_id(id: LaboratoryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_well_formed_and_distinct() {
        let a = ConceptId::new();
        let b = ConceptId::new();
        assert!(a.is_well_formed());
        assert_ne!(a, b);
    }

    #[test]
    fn blank_or_spaced_ids_are_malformed() {
        assert!(!ConceptId::from_string("").is_well_formed());
        assert!(!ConceptId::from_string("two words").is_well_formed());
        assert!(ConceptId::from_string("202501280001").is_well_formed());
    }
}
