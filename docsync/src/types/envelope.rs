use std::fmt;

use serde_json::Value;

/// Kind of row change carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    /// Parses an operation name case-insensitively.
    pub fn from_name(name: &str) -> Option<Operation> {
        if name.eq_ignore_ascii_case("insert") {
            Some(Operation::Insert)
        } else if name.eq_ignore_ascii_case("update") {
            Some(Operation::Update)
        } else if name.eq_ignore_ascii_case("delete") {
            Some(Operation::Delete)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded change message: the operation, the source table and the untouched row payload.
///
/// Envelopes are built per message and consumed once by the projector.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEnvelope {
    pub operation: Operation,
    pub table: String,
    pub payload: Value,
}

/// Source tables whose changes are mirrored into documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTable {
    Owners,
    Items,
    Tags,
    OwnerItems,
    ItemTags,
}

impl SourceTable {
    /// Resolves a table name, accepting both the canonical and the source schema names.
    pub fn from_name(name: &str) -> Option<SourceTable> {
        match name {
            "owners" | "users" => Some(SourceTable::Owners),
            "items" | "projects" => Some(SourceTable::Items),
            "tags" | "hashtags" => Some(SourceTable::Tags),
            "owner_items" | "user_projects" => Some(SourceTable::OwnerItems),
            "item_tags" | "project_hashtags" => Some(SourceTable::ItemTags),
            _ => None,
        }
    }

    /// Returns `true` for pure relation tables whose rows only carry foreign ids.
    pub fn is_join(&self) -> bool {
        matches!(self, SourceTable::OwnerItems | SourceTable::ItemTags)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTable::Owners => "owners",
            SourceTable::Items => "items",
            SourceTable::Tags => "tags",
            SourceTable::OwnerItems => "owner_items",
            SourceTable::ItemTags => "item_tags",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
