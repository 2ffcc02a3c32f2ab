use crate::types::{
    Document, EntityChange, ItemDelete, ItemDetach, ItemId, OwnerDelete, OwnerId, RowUpsert,
    TagDelete, TagDetach, TagId,
};

/// How the documents affected by a change are located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The document of this owner.
    Owner(OwnerId),
    /// Every document containing this item.
    Item(ItemId),
    /// Every document containing an item with this tag.
    Tag(TagId),
}

/// Capabilities of a change against the documents it touches.
///
/// Every change variant implements this so that the engine can resolve, seed and merge without
/// knowing the variant.
pub trait DocumentChange {
    /// Returns how to locate the documents this change applies to, `None` if it names no id.
    fn target(&self) -> Option<Target>;

    /// Returns `true` if the change has something to do on `document`.
    fn applies_to(&self, document: &Document) -> bool;

    /// Applies the change to `document`, returning whether anything changed.
    fn merge(&self, document: &mut Document) -> bool;

    /// Builds the initial document when no target exists.
    ///
    /// Returns `None` when the change cannot root a document.
    fn seed(&self) -> Option<Document> {
        None
    }

    /// Returns `true` if resolved documents are deleted rather than merged.
    fn deletes_document(&self) -> bool {
        false
    }
}

impl DocumentChange for RowUpsert {
    fn target(&self) -> Option<Target> {
        if let Some(owner) = &self.owner {
            Some(Target::Owner(owner.id))
        } else if let Some(item) = &self.item {
            Some(Target::Item(item.id))
        } else {
            self.tag.as_ref().map(|tag| Target::Tag(tag.id))
        }
    }

    fn applies_to(&self, document: &Document) -> bool {
        match self.target() {
            Some(Target::Owner(owner_id)) => document.id == owner_id,
            Some(Target::Item(item_id)) => document.contains_item(item_id),
            Some(Target::Tag(tag_id)) => document.contains_tag(tag_id),
            None => false,
        }
    }

    fn merge(&self, document: &mut Document) -> bool {
        let mut changed = false;

        if let Some(owner) = &self.owner
            && owner.id == document.id
        {
            changed |= owner.patch(document);
        }

        match (&self.item, &self.tag) {
            (Some(item_fields), tag_fields) => match document.item_mut(item_fields.id) {
                Some(item) => {
                    // Attributes borrowed from another copy may be staler than this one.
                    if !item_fields.hydrated {
                        changed |= item_fields.patch(item);
                    }
                    if let Some(tag_fields) = tag_fields {
                        changed |= match item.tag_mut(tag_fields.id) {
                            Some(_) if tag_fields.hydrated => false,
                            Some(tag) => tag_fields.patch(tag),
                            None => {
                                item.tags.push(tag_fields.to_tag());
                                true
                            }
                        };
                    }
                }
                None => {
                    let mut item = item_fields.to_item();
                    if let Some(tag_fields) = tag_fields {
                        item.tags.push(tag_fields.to_tag());
                    }
                    document.items.push(item);
                    changed = true;
                }
            },
            (None, Some(tag_fields)) => {
                for item in &mut document.items {
                    if let Some(tag) = item.tag_mut(tag_fields.id) {
                        changed |= tag_fields.patch(tag);
                    }
                }
            }
            (None, None) => {}
        }

        changed
    }

    fn seed(&self) -> Option<Document> {
        let owner = self.owner.as_ref()?;

        let mut document = Document::new(owner.id);
        owner.patch(&mut document);
        self.merge(&mut document);

        Some(document)
    }
}

impl DocumentChange for OwnerDelete {
    fn target(&self) -> Option<Target> {
        Some(Target::Owner(self.owner_id))
    }

    fn applies_to(&self, document: &Document) -> bool {
        document.id == self.owner_id
    }

    fn merge(&self, _document: &mut Document) -> bool {
        false
    }

    fn deletes_document(&self) -> bool {
        true
    }
}

impl DocumentChange for ItemDelete {
    fn target(&self) -> Option<Target> {
        Some(Target::Item(self.item_id))
    }

    fn applies_to(&self, document: &Document) -> bool {
        document.contains_item(self.item_id)
    }

    fn merge(&self, document: &mut Document) -> bool {
        let before = document.items.len();
        document.items.retain(|item| item.id != self.item_id);

        document.items.len() != before
    }
}

impl DocumentChange for TagDelete {
    fn target(&self) -> Option<Target> {
        Some(Target::Tag(self.tag_id))
    }

    fn applies_to(&self, document: &Document) -> bool {
        document.contains_tag(self.tag_id)
    }

    fn merge(&self, document: &mut Document) -> bool {
        let mut changed = false;
        for item in &mut document.items {
            let before = item.tags.len();
            item.tags.retain(|tag| tag.id != self.tag_id);
            changed |= item.tags.len() != before;
        }

        changed
    }
}

impl DocumentChange for ItemDetach {
    fn target(&self) -> Option<Target> {
        Some(Target::Owner(self.owner_id))
    }

    fn applies_to(&self, document: &Document) -> bool {
        document.id == self.owner_id && document.contains_item(self.item_id)
    }

    fn merge(&self, document: &mut Document) -> bool {
        ItemDelete {
            item_id: self.item_id,
        }
        .merge(document)
    }
}

impl DocumentChange for TagDetach {
    fn target(&self) -> Option<Target> {
        Some(Target::Item(self.item_id))
    }

    fn applies_to(&self, document: &Document) -> bool {
        document
            .item(self.item_id)
            .is_some_and(|item| item.contains_tag(self.tag_id))
    }

    fn merge(&self, document: &mut Document) -> bool {
        let Some(item) = document.item_mut(self.item_id) else {
            return false;
        };

        let before = item.tags.len();
        item.tags.retain(|tag| tag.id != self.tag_id);

        item.tags.len() != before
    }
}

impl DocumentChange for EntityChange {
    fn target(&self) -> Option<Target> {
        self.as_change().target()
    }

    fn applies_to(&self, document: &Document) -> bool {
        self.as_change().applies_to(document)
    }

    fn merge(&self, document: &mut Document) -> bool {
        self.as_change().merge(document)
    }

    fn seed(&self) -> Option<Document> {
        self.as_change().seed()
    }

    fn deletes_document(&self) -> bool {
        self.as_change().deletes_document()
    }
}

impl EntityChange {
    fn as_change(&self) -> &dyn DocumentChange {
        match self {
            EntityChange::Upsert(change) => change,
            EntityChange::OwnerDeleted(change) => change,
            EntityChange::ItemDeleted(change) => change,
            EntityChange::TagDeleted(change) => change,
            EntityChange::ItemDetached(change) => change,
            EntityChange::TagDetached(change) => change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Item, ItemFields, Operation, OwnerFields, Tag, TagFields};

    fn document() -> Document {
        let mut item = Item::new(10);
        item.name = "Proj".to_string();
        item.slug = "p-slug".to_string();
        item.description = "desc".to_string();
        item.tags = vec![tag(100, "go"), tag(101, "rust")];

        let mut other = Item::new(11);
        other.tags = vec![tag(100, "go")];

        Document {
            id: 1,
            name: "Alice".to_string(),
            created_at: String::new(),
            items: vec![item, other],
        }
    }

    fn tag(id: TagId, name: &str) -> Tag {
        Tag {
            id,
            name: name.to_string(),
            created_at: String::new(),
        }
    }

    fn upsert(
        owner: Option<OwnerFields>,
        item: Option<ItemFields>,
        tag: Option<TagFields>,
    ) -> RowUpsert {
        RowUpsert {
            operation: Operation::Insert,
            owner,
            item,
            tag,
        }
    }

    #[test]
    fn upsert_appends_unknown_item_with_its_tag() {
        let mut document = document();
        let change = upsert(
            Some(OwnerFields::new(1)),
            Some(ItemFields {
                name: Some("New".to_string()),
                ..ItemFields::new(12)
            }),
            Some(TagFields::new(102)),
        );

        assert!(change.merge(&mut document));
        let item = document.item(12).unwrap();
        assert_eq!(item.name, "New");
        assert_eq!(item.tags, vec![Tag::new(102)]);
        assert_eq!(document.items.len(), 3);
    }

    #[test]
    fn upsert_of_materialized_item_is_idempotent() {
        let mut document = document();
        let change = upsert(
            Some(OwnerFields::new(1)),
            Some(ItemFields {
                name: Some("Proj".to_string()),
                ..ItemFields::new(10)
            }),
            Some(TagFields {
                name: Some("go".to_string()),
                ..TagFields::new(100)
            }),
        );

        assert!(!change.merge(&mut document));
        assert_eq!(document, self::document());
    }

    #[test]
    fn hydrated_attributes_never_overwrite_existing_entities() {
        let mut document = document();
        let change = upsert(
            Some(OwnerFields::new(1)),
            Some(ItemFields {
                name: Some(String::new()),
                slug: Some("stale".to_string()),
                hydrated: true,
                ..ItemFields::new(10)
            }),
            Some(TagFields {
                name: Some("stale".to_string()),
                hydrated: true,
                ..TagFields::new(100)
            }),
        );

        assert!(!change.merge(&mut document));
        assert_eq!(document, self::document());

        let appended = upsert(
            Some(OwnerFields::new(1)),
            Some(ItemFields {
                name: Some("Borrowed".to_string()),
                hydrated: true,
                ..ItemFields::new(12)
            }),
            None,
        );
        assert!(appended.merge(&mut document));
        assert_eq!(document.item(12).unwrap().name, "Borrowed");
    }

    #[test]
    fn tag_only_upsert_patches_every_item() {
        let mut document = document();
        let change = upsert(
            None,
            None,
            Some(TagFields {
                name: Some("golang".to_string()),
                ..TagFields::new(100)
            }),
        );

        assert_eq!(change.target(), Some(Target::Tag(100)));
        assert!(change.applies_to(&document));
        assert!(change.merge(&mut document));
        assert!(
            document
                .items
                .iter()
                .all(|item| item.tags.iter().any(|tag| tag.name == "golang"))
        );
        assert_eq!(document.item(10).unwrap().tags[1].name, "rust");
    }

    #[test]
    fn seed_requires_an_owner() {
        let rooted = upsert(
            Some(OwnerFields {
                name: Some("Bob".to_string()),
                ..OwnerFields::new(2)
            }),
            Some(ItemFields::new(20)),
            None,
        );
        let seeded = rooted.seed().unwrap();
        assert_eq!(seeded.id, 2);
        assert_eq!(seeded.name, "Bob");
        assert_eq!(seeded.items, vec![Item::new(20)]);

        let unrooted = upsert(None, Some(ItemFields::new(20)), None);
        assert!(unrooted.seed().is_none());
    }

    #[test]
    fn item_delete_removes_item_and_its_tags() {
        let mut document = document();

        assert!(ItemDelete { item_id: 10 }.merge(&mut document));
        assert!(!document.contains_item(10));
        assert!(document.contains_item(11));
        assert!(!ItemDelete { item_id: 10 }.merge(&mut document));
    }

    #[test]
    fn tag_delete_removes_tag_everywhere() {
        let mut document = document();

        assert!(TagDelete { tag_id: 100 }.merge(&mut document));
        assert!(!document.contains_tag(100));
        assert!(document.contains_tag(101));
    }

    #[test]
    fn tag_detach_only_touches_named_item() {
        let mut document = document();
        let change = TagDetach {
            item_id: 10,
            tag_id: 100,
        };

        assert!(change.applies_to(&document));
        assert!(change.merge(&mut document));
        assert!(!document.item(10).unwrap().contains_tag(100));
        assert!(document.item(11).unwrap().contains_tag(100));
        assert!(!change.applies_to(&document));
    }

    #[test]
    fn item_detach_targets_the_owner() {
        let mut document = document();
        let change = ItemDetach {
            owner_id: 1,
            item_id: 11,
        };

        assert_eq!(change.target(), Some(Target::Owner(1)));
        assert!(change.merge(&mut document));
        assert_eq!(document.items.len(), 1);
    }

    #[test]
    fn owner_delete_deletes_document() {
        let change = EntityChange::OwnerDeleted(OwnerDelete { owner_id: 1 });

        assert!(change.deletes_document());
        assert!(change.seed().is_none());
        assert_eq!(change.target(), Some(Target::Owner(1)));
    }
}
