use crate::types::{Document, Item, Operation, Tag};

/// Identifier of an owner, equal to the id of its document.
pub type OwnerId = i64;

/// Identifier of an item.
pub type ItemId = i64;

/// Identifier of a tag.
pub type TagId = i64;

/// Owner attributes carried by a row. Absent attributes are `None` and never overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerFields {
    pub id: OwnerId,
    pub name: Option<String>,
    pub created_at: Option<String>,
}

impl OwnerFields {
    pub fn new(id: OwnerId) -> Self {
        Self {
            id,
            name: None,
            created_at: None,
        }
    }

    /// Writes the present attributes into the document root, returning whether it changed.
    pub fn patch(&self, document: &mut Document) -> bool {
        patch_field(&mut document.name, &self.name)
            | patch_field(&mut document.created_at, &self.created_at)
    }
}

/// Item attributes carried by a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFields {
    pub id: ItemId,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    /// Set when some attributes were copied from a known copy of the item instead of being
    /// carried by the row. Such attributes fill a newly appended item but never overwrite an
    /// item already in the document.
    pub hydrated: bool,
}

impl ItemFields {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            name: None,
            slug: None,
            description: None,
            created_at: None,
            hydrated: false,
        }
    }

    /// Returns `true` when only the id is known, as on attach rows of join tables.
    pub fn is_bare(&self) -> bool {
        self.name.is_none()
            && self.slug.is_none()
            && self.description.is_none()
            && self.created_at.is_none()
    }

    /// Returns `true` when every attribute is known.
    pub fn is_complete(&self) -> bool {
        self.name.is_some()
            && self.slug.is_some()
            && self.description.is_some()
            && self.created_at.is_some()
    }

    /// Returns `true` when attributes should still be looked up before the item is appended.
    pub fn needs_hydration(&self) -> bool {
        self.is_bare() || (self.hydrated && !self.is_complete())
    }

    /// Overwrites the attributes `other` carries, keeping the others.
    pub fn absorb(&mut self, other: &ItemFields) {
        absorb_field(&mut self.name, &other.name);
        absorb_field(&mut self.slug, &other.slug);
        absorb_field(&mut self.description, &other.description);
        absorb_field(&mut self.created_at, &other.created_at);
    }

    /// Fills the attributes still unknown from an already materialized copy of the item.
    pub fn fill_missing_from(&mut self, item: &Item) {
        self.name.get_or_insert_with(|| item.name.clone());
        self.slug.get_or_insert_with(|| item.slug.clone());
        self.description
            .get_or_insert_with(|| item.description.clone());
        self.created_at.get_or_insert_with(|| item.created_at.clone());
        self.hydrated = true;
    }

    pub fn to_item(&self) -> Item {
        let mut item = Item::new(self.id);
        self.patch(&mut item);

        item
    }

    /// Writes the present attributes into `item`, leaving its tags untouched.
    pub fn patch(&self, item: &mut Item) -> bool {
        patch_field(&mut item.name, &self.name)
            | patch_field(&mut item.slug, &self.slug)
            | patch_field(&mut item.description, &self.description)
            | patch_field(&mut item.created_at, &self.created_at)
    }
}

/// Tag attributes carried by a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFields {
    pub id: TagId,
    pub name: Option<String>,
    pub created_at: Option<String>,
    /// See [`ItemFields::hydrated`].
    pub hydrated: bool,
}

impl TagFields {
    pub fn new(id: TagId) -> Self {
        Self {
            id,
            name: None,
            created_at: None,
            hydrated: false,
        }
    }

    pub fn is_bare(&self) -> bool {
        self.name.is_none() && self.created_at.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.created_at.is_some()
    }

    pub fn needs_hydration(&self) -> bool {
        self.is_bare() || (self.hydrated && !self.is_complete())
    }

    pub fn absorb(&mut self, other: &TagFields) {
        absorb_field(&mut self.name, &other.name);
        absorb_field(&mut self.created_at, &other.created_at);
    }

    pub fn fill_missing_from(&mut self, tag: &Tag) {
        self.name.get_or_insert_with(|| tag.name.clone());
        self.created_at.get_or_insert_with(|| tag.created_at.clone());
        self.hydrated = true;
    }

    pub fn to_tag(&self) -> Tag {
        let mut tag = Tag::new(self.id);
        self.patch(&mut tag);

        tag
    }

    pub fn patch(&self, tag: &mut Tag) -> bool {
        patch_field(&mut tag.name, &self.name) | patch_field(&mut tag.created_at, &self.created_at)
    }
}

/// An insert or update of one flattened row.
///
/// Any subset of the three levels may be present; the merge engine roots, patches or appends
/// whichever levels the row carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowUpsert {
    pub operation: Operation,
    pub owner: Option<OwnerFields>,
    pub item: Option<ItemFields>,
    pub tag: Option<TagFields>,
}

/// Deletion of an owner, which removes its whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerDelete {
    pub owner_id: OwnerId,
}

/// Deletion of an item, which prunes it from every document containing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDelete {
    pub item_id: ItemId,
}

/// Deletion of a tag, which prunes it from every item containing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagDelete {
    pub tag_id: TagId,
}

/// Removal of an owner to item relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDetach {
    pub owner_id: OwnerId,
    pub item_id: ItemId,
}

/// Removal of an item to tag relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagDetach {
    pub item_id: ItemId,
    pub tag_id: TagId,
}

/// A normalized entity change produced from one change message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityChange {
    Upsert(RowUpsert),
    OwnerDeleted(OwnerDelete),
    ItemDeleted(ItemDelete),
    TagDeleted(TagDelete),
    ItemDetached(ItemDetach),
    TagDetached(TagDetach),
}

impl EntityChange {
    /// Returns the owner id named by the change, if any.
    pub fn owner_id(&self) -> Option<OwnerId> {
        match self {
            EntityChange::Upsert(row) => row.owner.as_ref().map(|owner| owner.id),
            EntityChange::OwnerDeleted(change) => Some(change.owner_id),
            EntityChange::ItemDetached(change) => Some(change.owner_id),
            _ => None,
        }
    }

    /// Returns the item id named by the change, if any.
    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            EntityChange::Upsert(row) => row.item.as_ref().map(|item| item.id),
            EntityChange::ItemDeleted(change) => Some(change.item_id),
            EntityChange::ItemDetached(change) => Some(change.item_id),
            EntityChange::TagDetached(change) => Some(change.item_id),
            _ => None,
        }
    }

    /// Returns the tag id named by the change, if any.
    pub fn tag_id(&self) -> Option<TagId> {
        match self {
            EntityChange::Upsert(row) => row.tag.as_ref().map(|tag| tag.id),
            EntityChange::TagDeleted(change) => Some(change.tag_id),
            EntityChange::TagDetached(change) => Some(change.tag_id),
            _ => None,
        }
    }

    /// Returns `true` for changes that only ever remove data.
    pub fn is_removal(&self) -> bool {
        !matches!(self, EntityChange::Upsert(_))
    }

    /// Returns a stable name of the change variant, used for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            EntityChange::Upsert(_) => "upsert",
            EntityChange::OwnerDeleted(_) => "owner_deleted",
            EntityChange::ItemDeleted(_) => "item_deleted",
            EntityChange::TagDeleted(_) => "tag_deleted",
            EntityChange::ItemDetached(_) => "item_detached",
            EntityChange::TagDetached(_) => "tag_detached",
        }
    }
}

/// Overwrites `target` with `value` when present and different.
fn patch_field(target: &mut String, value: &Option<String>) -> bool {
    match value {
        Some(value) if target != value => {
            target.clone_from(value);
            true
        }
        _ => false,
    }
}

fn absorb_field(target: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        target.clone_from(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_only_touches_present_fields() {
        let mut item = Item::new(10);
        item.name = "Proj".to_string();
        item.slug = "p-slug".to_string();
        item.tags.push(Tag::new(100));

        let fields = ItemFields {
            description: Some("new".to_string()),
            ..ItemFields::new(10)
        };

        assert!(fields.patch(&mut item));
        assert_eq!(item.name, "Proj");
        assert_eq!(item.slug, "p-slug");
        assert_eq!(item.description, "new");
        assert_eq!(item.tags.len(), 1);

        assert!(!fields.patch(&mut item));
    }

    #[test]
    fn change_exposes_referenced_ids() {
        let change = EntityChange::TagDetached(TagDetach {
            item_id: 10,
            tag_id: 100,
        });

        assert_eq!(change.owner_id(), None);
        assert_eq!(change.item_id(), Some(10));
        assert_eq!(change.tag_id(), Some(100));
        assert!(change.is_removal());
    }

    #[test]
    fn absorbing_keeps_unknown_attributes_unknown() {
        let mut cached = ItemFields::new(10);
        cached.absorb(&ItemFields {
            description: Some("new".to_string()),
            ..ItemFields::new(10)
        });

        assert_eq!(cached.name, None);
        assert_eq!(cached.description.as_deref(), Some("new"));
        assert!(!cached.is_complete());
    }

    #[test]
    fn filling_only_completes_missing_attributes() {
        let mut item = Item::new(10);
        item.name = "Proj".to_string();
        item.description = "old".to_string();

        let mut fields = ItemFields {
            description: Some("new".to_string()),
            ..ItemFields::new(10)
        };
        fields.fill_missing_from(&item);

        assert!(fields.hydrated);
        assert!(fields.is_complete());
        assert!(!fields.needs_hydration());
        assert_eq!(fields.name.as_deref(), Some("Proj"));
        assert_eq!(fields.description.as_deref(), Some("new"));
    }
}
