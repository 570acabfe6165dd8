//! Typed, weighted relationships between concepts

use super::concept::ConceptId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default strength and confidence for a relationship asserted without one
pub const DEFAULT_WEIGHT: f32 = 0.5;

/// Unique identifier for a relationship (assigned by the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(i64);

impl RelationshipId {
    pub fn from_raw(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of relationship between concepts (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    /// Similar meaning or topic
    Semantic,
    /// Cause and effect
    Causal,
    /// General to specific
    Hierarchical,
    /// Time-based sequence
    Temporal,
    /// Opposing ideas
    Contradictory,
    /// Supporting ideas
    Complementary,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 6] = [
        Self::Semantic,
        Self::Causal,
        Self::Hierarchical,
        Self::Temporal,
        Self::Contradictory,
        Self::Complementary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Causal => "causal",
            Self::Hierarchical => "hierarchical",
            Self::Temporal => "temporal",
            Self::Contradictory => "contradictory",
            Self::Complementary => "complementary",
        }
    }

    /// Short human-readable verb for display
    pub fn label(&self) -> &'static str {
        match self {
            Self::Semantic => "Similar",
            Self::Causal => "Causes",
            Self::Hierarchical => "Contains",
            Self::Temporal => "Follows",
            Self::Contradictory => "Opposes",
            Self::Complementary => "Supports",
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Invalid relationship type: {}", s))
    }
}

/// Who asserted a relationship or assigned a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    User,
    Ai,
    #[default]
    System,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Actor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "ai" => Ok(Self::Ai),
            "system" => Ok(Self::System),
            _ => Err(format!("Invalid actor: {}", s)),
        }
    }
}

/// Clamp a weight into [0.0, 1.0]; NaN falls back to `fallback`
pub fn clamp_unit(value: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A directed relationship between two concepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRelationship {
    pub id: RelationshipId,
    pub source: ConceptId,
    pub target: ConceptId,
    pub relationship_type: RelationshipType,
    pub description: Option<String>,
    /// Relationship strength (0.0 - 1.0)
    pub strength: f32,
    /// Confidence in relationship validity (0.0 - 1.0)
    pub confidence: f32,
    pub created_by: Actor,
    /// Confirmed by a human, regardless of who created it
    pub is_validated: bool,
    /// Navigable from the target as well as from the source
    pub is_bidirectional: bool,
    /// How often a traversal has used this relationship
    pub access_count: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConceptRelationship {
    /// Whether a traversal standing on `concept` may follow this edge
    pub fn navigable_from(&self, concept: &ConceptId) -> bool {
        &self.source == concept || (self.is_bidirectional && &self.target == concept)
    }

    /// The endpoint reached by following this edge from `concept`
    pub fn other_end(&self, concept: &ConceptId) -> Option<&ConceptId> {
        if &self.source == concept {
            Some(&self.target)
        } else if self.is_bidirectional && &self.target == concept {
            Some(&self.source)
        } else {
            None
        }
    }

    /// View this edge with `concept` on the "from" side
    pub fn oriented_from(&self, concept: &ConceptId) -> Option<RelationshipView> {
        let to = self.other_end(concept)?.clone();
        Some(RelationshipView {
            from: concept.clone(),
            to,
            reversed: &self.source != concept,
            relationship: self.clone(),
        })
    }
}

/// A relationship as seen from one of its endpoints
///
/// `reversed` is true when the stored direction runs `to -> from`, which is
/// only possible for bidirectional edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipView {
    pub from: ConceptId,
    pub to: ConceptId,
    pub reversed: bool,
    pub relationship: ConceptRelationship,
}

/// Caller-facing description of a relationship to assert
///
/// Unset weights take the configured defaults when resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDraft {
    pub source: ConceptId,
    pub target: ConceptId,
    pub relationship_type: RelationshipType,
    pub strength: Option<f32>,
    pub confidence: Option<f32>,
    pub created_by: Actor,
    pub is_bidirectional: bool,
    pub description: Option<String>,
}

impl RelationshipDraft {
    pub fn new(source: ConceptId, target: ConceptId, relationship_type: RelationshipType) -> Self {
        Self {
            source,
            target,
            relationship_type,
            strength: None,
            confidence: None,
            created_by: Actor::System,
            is_bidirectional: true,
            description: None,
        }
    }

    pub fn strength(mut self, strength: f32) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn created_by(mut self, actor: Actor) -> Self {
        self.created_by = actor;
        self
    }

    pub fn bidirectional(mut self, is_bidirectional: bool) -> Self {
        self.is_bidirectional = is_bidirectional;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Fill in defaults and clamp weights into range
    pub fn resolve(self, default_strength: f32, default_confidence: f32) -> NewRelationship {
        NewRelationship {
            strength: clamp_unit(self.strength.unwrap_or(default_strength), default_strength),
            confidence: clamp_unit(self.confidence.unwrap_or(default_confidence), default_confidence),
            source: self.source,
            target: self.target,
            relationship_type: self.relationship_type,
            created_by: self.created_by,
            is_bidirectional: self.is_bidirectional,
            description: self.description,
        }
    }
}

/// A fully resolved relationship, ready for the store's upsert
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelationship {
    pub source: ConceptId,
    pub target: ConceptId,
    pub relationship_type: RelationshipType,
    pub strength: f32,
    pub confidence: f32,
    pub created_by: Actor,
    pub is_bidirectional: bool,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, target: &str, bidirectional: bool) -> ConceptRelationship {
        let now = Utc::now();
        ConceptRelationship {
            id: RelationshipId::from_raw(1),
            source: ConceptId::from(source),
            target: ConceptId::from(target),
            relationship_type: RelationshipType::Causal,
            description: None,
            strength: DEFAULT_WEIGHT,
            confidence: DEFAULT_WEIGHT,
            created_by: Actor::User,
            is_validated: false,
            is_bidirectional: bidirectional,
            access_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn clamp_unit_bounds_and_nan() {
        assert_eq!(clamp_unit(1.7, 0.5), 1.0);
        assert_eq!(clamp_unit(-0.2, 0.5), 0.0);
        assert_eq!(clamp_unit(0.3, 0.5), 0.3);
        assert_eq!(clamp_unit(f32::NAN, 0.5), 0.5);
    }

    #[test]
    fn resolve_applies_defaults_then_clamps() {
        let draft = RelationshipDraft::new("a".into(), "b".into(), RelationshipType::Semantic).strength(3.0);
        let resolved = draft.resolve(0.5, 0.4);
        assert_eq!(resolved.strength, 1.0);
        assert_eq!(resolved.confidence, 0.4);
        assert!(resolved.is_bidirectional);
        assert_eq!(resolved.created_by, Actor::System);
    }

    #[test]
    fn directed_edge_is_only_navigable_from_source() {
        let e = edge("a", "b", false);
        assert!(e.navigable_from(&"a".into()));
        assert!(!e.navigable_from(&"b".into()));
        assert!(e.oriented_from(&"b".into()).is_none());
    }

    #[test]
    fn bidirectional_edge_orients_from_target() {
        let e = edge("a", "b", true);
        let view = e.oriented_from(&"b".into()).unwrap();
        assert_eq!(view.from.as_str(), "b");
        assert_eq!(view.to.as_str(), "a");
        assert!(view.reversed);

        let forward = e.oriented_from(&"a".into()).unwrap();
        assert!(!forward.reversed);
        assert_eq!(forward.to.as_str(), "b");
    }

    #[test]
    fn relationship_type_parses_case_insensitively() {
        assert_eq!("Causal".parse::<RelationshipType>(), Ok(RelationshipType::Causal));
        assert!("friendship".parse::<RelationshipType>().is_err());
        for t in RelationshipType::ALL {
            assert_eq!(t.as_str().parse::<RelationshipType>(), Ok(t));
        }
    }
}
