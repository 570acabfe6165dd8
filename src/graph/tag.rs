//! Hierarchical tags and their association with concepts
//!
//! Tags form a forest: each tag has at most one parent, referenced by ID.
//! The `TagArena` holds the parent links so that hierarchy checks never chase
//! live object references.

use super::concept::{ConceptId, LaboratoryId};
use super::relationship::Actor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Default display color for new tags
pub const DEFAULT_TAG_COLOR: &str = "#6B7280";

/// Longest accepted tag name, in characters
pub const MAX_TAG_NAME_LEN: usize = 50;

/// Unique identifier for a tag (assigned by the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(i64);

impl TagId {
    pub fn from_raw(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A label applied to concepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    /// Unique only within a laboratory
    pub name: String,
    pub description: Option<String>,
    /// Hex color for display
    pub color: String,
    /// `None` for tags shared by every laboratory
    pub laboratory_id: Option<LaboratoryId>,
    pub parent_id: Option<TagId>,
    /// Number of concepts currently carrying this tag
    pub usage_count: u64,
    pub is_system_tag: bool,
    /// Retired tags are not listed or assignable; existing associations stay
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A tag to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewTag {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub laboratory_id: Option<LaboratoryId>,
    pub parent_id: Option<TagId>,
    pub is_system_tag: bool,
}

impl NewTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            color: DEFAULT_TAG_COLOR.to_string(),
            laboratory_id: None,
            parent_id: None,
            is_system_tag: false,
        }
    }

    pub fn in_laboratory(mut self, laboratory_id: LaboratoryId) -> Self {
        self.laboratory_id = Some(laboratory_id);
        self
    }

    pub fn with_parent(mut self, parent_id: TagId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system_tag = true;
        self
    }

    /// Check name and color; returns a description of the first problem
    pub fn check(&self) -> Result<(), String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("tag name must not be empty".to_string());
        }
        if name.chars().count() > MAX_TAG_NAME_LEN {
            return Err(format!("tag name exceeds {} characters", MAX_TAG_NAME_LEN));
        }
        if name.contains('/') {
            return Err("tag name must not contain '/'".to_string());
        }
        if !is_hex_color(&self.color) {
            return Err(format!("invalid tag color: {}", self.color));
        }
        Ok(())
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// The link between a concept and one of its tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagAssociation {
    pub concept_id: ConceptId,
    pub tag_id: TagId,
    pub confidence: f32,
    pub assigned_by: Actor,
    pub created_at: DateTime<Utc>,
}

/// Violations of the tag hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("Tag {tag} cannot take {parent} as parent: it would become its own ancestor")]
    CycleWouldForm { tag: TagId, parent: TagId },

    #[error("Parent chain of tag {0} loops back on itself")]
    CycleDetected(TagId),

    #[error("Tag not found: {0}")]
    UnknownTag(TagId),
}

#[derive(Debug, Clone)]
struct TagLink {
    name: String,
    parent: Option<TagId>,
}

/// Arena of tag names and parent links, indexed by ID
#[derive(Debug, Clone, Default)]
pub struct TagArena {
    links: HashMap<TagId, TagLink>,
}

impl TagArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TagId, name: impl Into<String>, parent: Option<TagId>) {
        self.links.insert(
            id,
            TagLink {
                name: name.into(),
                parent,
            },
        );
    }

    pub fn contains(&self, id: TagId) -> bool {
        self.links.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn parent_of(&self, id: TagId) -> Option<TagId> {
        self.links.get(&id).and_then(|l| l.parent)
    }

    /// Tags from `id` up to its root, `id` first
    ///
    /// Fails with `CycleDetected` if the walk revisits a tag. A parent that is
    /// missing from the arena ends the chain.
    pub fn lineage(&self, id: TagId) -> Result<Vec<TagId>, HierarchyError> {
        if !self.contains(id) {
            return Err(HierarchyError::UnknownTag(id));
        }

        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        let mut current = Some(id);

        while let Some(tag) = current {
            let Some(link) = self.links.get(&tag) else {
                break;
            };
            if !seen.insert(tag) {
                return Err(HierarchyError::CycleDetected(id));
            }
            chain.push(tag);
            current = link.parent;
        }

        Ok(chain)
    }

    /// Slash-joined name from the root down to `id`, e.g. "science/physics/optics"
    pub fn full_name(&self, id: TagId) -> Result<String, HierarchyError> {
        let mut names: Vec<&str> = self
            .lineage(id)?
            .into_iter()
            .filter_map(|t| self.links.get(&t).map(|l| l.name.as_str()))
            .collect();
        names.reverse();
        Ok(names.join("/"))
    }

    /// Check that giving `tag` the parent `proposed` keeps the hierarchy a forest
    ///
    /// Walks the proposed ancestor chain; meeting `tag` on the way means the
    /// change would make it its own ancestor.
    pub fn check_parent(&self, tag: TagId, proposed: Option<TagId>) -> Result<(), HierarchyError> {
        if !self.contains(tag) {
            return Err(HierarchyError::UnknownTag(tag));
        }
        let Some(parent) = proposed else {
            return Ok(());
        };
        if !self.contains(parent) {
            return Err(HierarchyError::UnknownTag(parent));
        }

        let mut seen = HashSet::new();
        let mut current = Some(parent);
        while let Some(ancestor) = current {
            if ancestor == tag {
                return Err(HierarchyError::CycleWouldForm { tag, parent });
            }
            if !seen.insert(ancestor) {
                return Err(HierarchyError::CycleDetected(parent));
            }
            current = self.parent_of(ancestor);
        }

        Ok(())
    }
}

impl<'a> FromIterator<&'a Tag> for TagArena {
    fn from_iter<I: IntoIterator<Item = &'a Tag>>(iter: I) -> Self {
        let mut arena = TagArena::new();
        for tag in iter {
            arena.insert(tag.id, tag.name.clone(), tag.parent_id);
        }
        arena
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: i64) -> TagId {
        TagId::from_raw(n)
    }

    /// grandparent(1) <- parent(2) <- child(3), plus a lone tag(4)
    fn family() -> TagArena {
        let mut arena = TagArena::new();
        arena.insert(id(1), "grandparent", None);
        arena.insert(id(2), "parent", Some(id(1)));
        arena.insert(id(3), "child", Some(id(2)));
        arena.insert(id(4), "lone", None);
        arena
    }

    #[test]
    fn full_name_walks_three_levels() {
        let arena = family();
        assert_eq!(arena.full_name(id(3)).unwrap(), "grandparent/parent/child");
        assert_eq!(arena.full_name(id(1)).unwrap(), "grandparent");
    }

    #[test]
    fn full_name_of_unknown_tag_fails() {
        assert_eq!(family().full_name(id(99)), Err(HierarchyError::UnknownTag(id(99))));
    }

    #[test]
    fn corrupt_chain_is_detected_on_read() {
        let mut arena = family();
        // Bypass check_parent to simulate a corrupt store
        arena.insert(id(1), "grandparent", Some(id(3)));
        assert_eq!(arena.full_name(id(3)), Err(HierarchyError::CycleDetected(id(3))));
    }

    #[test]
    fn reparent_onto_descendant_would_form_cycle() {
        let arena = family();
        assert_eq!(
            arena.check_parent(id(1), Some(id(3))),
            Err(HierarchyError::CycleWouldForm { tag: id(1), parent: id(3) })
        );
    }

    #[test]
    fn reparent_onto_self_would_form_cycle() {
        let arena = family();
        assert!(matches!(
            arena.check_parent(id(4), Some(id(4))),
            Err(HierarchyError::CycleWouldForm { .. })
        ));
    }

    #[test]
    fn legal_reparent_and_detach_are_accepted() {
        let arena = family();
        assert_eq!(arena.check_parent(id(4), Some(id(3))), Ok(()));
        assert_eq!(arena.check_parent(id(3), None), Ok(()));
    }

    #[test]
    fn new_tag_check_rejects_bad_input() {
        assert!(NewTag::new("  ").check().is_err());
        assert!(NewTag::new("a/b").check().is_err());
        assert!(NewTag::new("x".repeat(MAX_TAG_NAME_LEN + 1)).check().is_err());
        assert!(NewTag::new("ok").with_color("red").check().is_err());
        assert!(NewTag::new("ok").with_color("#10B981").check().is_ok());
    }
}
