use serde::{Deserialize, Serialize};

use crate::types::{ItemId, OwnerId, TagId};

/// Denormalized document stored in the index, one per owner.
///
/// The document id is the owner id. Items are kept in insertion order and are unique by id,
/// as are the tags of every item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: OwnerId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Document {
    /// Creates an empty document rooted at `id`.
    pub fn new(id: OwnerId) -> Self {
        Self {
            id,
            name: String::new(),
            created_at: String::new(),
            items: Vec::new(),
        }
    }

    pub fn item(&self, item_id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    pub fn contains_item(&self, item_id: ItemId) -> bool {
        self.item(item_id).is_some()
    }

    /// Returns `true` if any item of this document carries the tag.
    pub fn contains_tag(&self, tag_id: TagId) -> bool {
        self.items.iter().any(|item| item.contains_tag(tag_id))
    }

    /// Returns `true` if any item carries a tag named exactly `tag_name`.
    pub fn contains_tag_name(&self, tag_name: &str) -> bool {
        self.items
            .iter()
            .any(|item| item.tags.iter().any(|tag| tag.name == tag_name))
    }
}

/// An item embedded in an owner document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Item {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            name: String::new(),
            slug: String::new(),
            description: String::new(),
            created_at: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn tag_mut(&mut self, tag_id: TagId) -> Option<&mut Tag> {
        self.tags.iter_mut().find(|tag| tag.id == tag_id)
    }

    pub fn contains_tag(&self, tag_id: TagId) -> bool {
        self.tags.iter().any(|tag| tag.id == tag_id)
    }
}

/// A tag embedded in an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: String,
}

impl Tag {
    pub fn new(id: TagId) -> Self {
        Self {
            id,
            name: String::new(),
            created_at: String::new(),
        }
    }
}

/// A document returned by a search together with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub score: f64,
    pub document: Document,
}
