//! Serialization tests with JSON fixtures shaped like the CLI output

use serde_json::{json, Value};

/// Fixture: a relationship as emitted by `marie outgoing --json`
fn relationship_fixture() -> Value {
    json!({
        "id": 7,
        "source": "202501280001",
        "target": "202501280002",
        "relationship_type": "complementary",
        "description": "Both frame virtue as practice",
        "strength": 0.8,
        "confidence": 0.6,
        "created_by": "ai",
        "is_validated": true,
        "is_bidirectional": true,
        "access_count": 12,
        "is_active": true,
        "created_at": "2025-01-28T09:00:00Z",
        "updated_at": "2025-01-29T10:30:00Z"
    })
}

/// Fixture: a laboratory-scoped child tag
fn tag_fixture() -> Value {
    json!({
        "id": 3,
        "name": "stoicism",
        "description": null,
        "color": "#10B981",
        "laboratory_id": "lab-philosophy",
        "parent_id": 1,
        "usage_count": 4,
        "is_system_tag": false,
        "is_active": true,
        "created_at": "2025-01-28T09:00:00Z"
    })
}

#[cfg(test)]
mod serialization_tests {
    use super::*;
    use crate::graph::{
        Actor, ConceptId, ConceptRelationship, RelationshipId, RelationshipType, Tag, TagAssociation, TagId,
    };

    #[test]
    fn concept_id_serializes_as_string() {
        let id = ConceptId::from_string("202501280001");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"202501280001\"");
    }

    #[test]
    fn numeric_ids_serialize_as_numbers() {
        assert_eq!(serde_json::to_string(&RelationshipId::from_raw(7)).unwrap(), "7");
        let id: TagId = serde_json::from_str("3").unwrap();
        assert_eq!(id, TagId::from_raw(3));
    }

    #[test]
    fn relationship_type_serializes_lowercase() {
        let json = serde_json::to_string(&RelationshipType::Contradictory).unwrap();
        assert_eq!(json, "\"contradictory\"");

        let rt: RelationshipType = serde_json::from_str("\"hierarchical\"").unwrap();
        assert_eq!(rt, RelationshipType::Hierarchical);
    }

    #[test]
    fn unknown_relationship_type_is_rejected() {
        let result: Result<RelationshipType, _> = serde_json::from_str("\"friendship\"");
        assert!(result.is_err());
    }

    #[test]
    fn actor_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Actor::Ai).unwrap(), "\"ai\"");
        let actor: Actor = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(actor, Actor::User);
    }

    #[test]
    fn can_deserialize_relationship_fixture() {
        let result: Result<ConceptRelationship, _> = serde_json::from_value(relationship_fixture());
        assert!(result.is_ok(), "Failed to deserialize relationship fixture: {:?}", result.err());

        let rel = result.unwrap();
        assert_eq!(rel.id, RelationshipId::from_raw(7));
        assert_eq!(rel.source.as_str(), "202501280001");
        assert_eq!(rel.relationship_type, RelationshipType::Complementary);
        assert_eq!(rel.created_by, Actor::Ai);
        assert!(rel.is_validated);
        assert_eq!(rel.access_count, 12);
    }

    #[test]
    fn relationship_roundtrip_matches_fixture() {
        let rel: ConceptRelationship = serde_json::from_value(relationship_fixture()).unwrap();
        let json = serde_json::to_value(&rel).unwrap();
        let rel2: ConceptRelationship = serde_json::from_value(json.clone()).unwrap();

        assert_eq!(rel, rel2);
        assert_eq!(json["relationship_type"], "complementary");
        assert!(json["created_at"].is_string());
    }

    #[test]
    fn can_deserialize_tag_fixture() {
        let result: Result<Tag, _> = serde_json::from_value(tag_fixture());
        assert!(result.is_ok(), "Failed to deserialize tag fixture: {:?}", result.err());

        let tag = result.unwrap();
        assert_eq!(tag.name, "stoicism");
        assert_eq!(tag.parent_id, Some(TagId::from_raw(1)));
        assert_eq!(tag.laboratory_id.as_ref().map(|l| l.as_str()), Some("lab-philosophy"));
        assert!(tag.description.is_none());
    }

    #[test]
    fn tag_association_has_flat_structure() {
        let assoc = TagAssociation {
            concept_id: ConceptId::from("c1"),
            tag_id: TagId::from_raw(3),
            confidence: 1.0,
            assigned_by: Actor::User,
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&assoc).unwrap();

        assert_eq!(json["concept_id"], "c1");
        assert_eq!(json["tag_id"], 3);
        assert_eq!(json["assigned_by"], "user");
        assert!(json["confidence"].is_number());
    }
}
