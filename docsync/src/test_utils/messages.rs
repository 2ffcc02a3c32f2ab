use serde_json::{Value, json};

use crate::types::{ItemId, OwnerId, TagId};

/// Builds a raw change message as the transport delivers it.
pub fn message(operation: &str, table: &str, payload: Value) -> String {
    json!({ "operation": operation, "table": table, "payload": payload }).to_string()
}

pub fn owner_row(owner_id: OwnerId, name: &str) -> Value {
    json!({ "id": owner_id, "name": name, "created_at": "2024-01-01T00:00:00Z" })
}

pub fn item_row(item_id: ItemId, name: &str, slug: &str, description: &str) -> Value {
    json!({
        "id": item_id,
        "name": name,
        "slug": slug,
        "description": description,
        "created_at": "2024-01-02T00:00:00Z"
    })
}

pub fn tag_row(tag_id: TagId, name: &str) -> Value {
    json!({ "id": tag_id, "name": name, "created_at": "2024-01-03T00:00:00Z" })
}

/// Adds the owning user column to an item row.
pub fn with_owner(mut row: Value, owner_id: OwnerId) -> Value {
    row["user_id"] = json!(owner_id);
    row
}

/// Adds the carrying project column to a tag row.
pub fn with_item(mut row: Value, item_id: ItemId) -> Value {
    row["project_id"] = json!(item_id);
    row
}

/// Row of the owner to item join table.
pub fn owner_item_row(owner_id: OwnerId, item_id: ItemId) -> Value {
    json!({ "user_id": owner_id, "project_id": item_id })
}

/// Row of the item to tag join table.
pub fn item_tag_row(item_id: ItemId, tag_id: TagId) -> Value {
    json!({ "project_id": item_id, "hashtag_id": tag_id })
}

pub fn insert(table: &str, payload: Value) -> String {
    message("INSERT", table, payload)
}

pub fn update(table: &str, payload: Value) -> String {
    message("UPDATE", table, payload)
}

pub fn delete(table: &str, payload: Value) -> String {
    message("DELETE", table, payload)
}
