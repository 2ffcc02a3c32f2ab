use serde::Deserialize;
use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::types::{
    ChangeEnvelope, EntityChange, ItemDelete, ItemDetach, ItemFields, Operation, OwnerDelete,
    OwnerFields, RowUpsert, SourceTable, TagDelete, TagDetach, TagFields,
};

/// Source schema column names and the canonical names they stand for.
const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("user_id", "owner_id"),
    ("user_name", "owner_name"),
    ("user_created_at", "owner_created_at"),
    ("project_id", "item_id"),
    ("project_name", "item_name"),
    ("project_slug", "item_slug"),
    ("project_description", "item_description"),
    ("project_created_at", "item_created_at"),
    ("hashtag_id", "tag_id"),
    ("hashtag_name", "tag_name"),
    ("hashtag_created_at", "tag_created_at"),
];

/// Union of every payload shape a source table can emit.
///
/// Flattened columns use the canonical prefixes, see [`canonicalize_columns`]. The narrow
/// `id`/`name`/... columns of attribute tables are lifted to the table's own level.
#[derive(Debug, Default, Deserialize)]
struct RawRow {
    #[serde(default)]
    owner_id: Option<i64>,
    #[serde(default)]
    owner_name: Option<String>,
    #[serde(default)]
    owner_created_at: Option<String>,

    #[serde(default)]
    item_id: Option<i64>,
    #[serde(default)]
    item_name: Option<String>,
    #[serde(default)]
    item_slug: Option<String>,
    #[serde(default)]
    item_description: Option<String>,
    #[serde(default)]
    item_created_at: Option<String>,

    #[serde(default)]
    tag_id: Option<i64>,
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default)]
    tag_created_at: Option<String>,

    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl RawRow {
    /// Moves the narrow columns to the level of `table` without overriding flattened ones.
    fn lift(mut self, table: SourceTable) -> Self {
        match table {
            SourceTable::Owners => {
                self.owner_id = self.owner_id.or(self.id.take());
                self.owner_name = self.owner_name.or(self.name.take());
                self.owner_created_at = self.owner_created_at.or(self.created_at.take());
            }
            SourceTable::Items => {
                self.item_id = self.item_id.or(self.id.take());
                self.item_name = self.item_name.or(self.name.take());
                self.item_slug = self.item_slug.or(self.slug.take());
                self.item_description = self.item_description.or(self.description.take());
                self.item_created_at = self.item_created_at.or(self.created_at.take());
            }
            SourceTable::Tags => {
                self.tag_id = self.tag_id.or(self.id.take());
                self.tag_name = self.tag_name.or(self.name.take());
                self.tag_created_at = self.tag_created_at.or(self.created_at.take());
            }
            SourceTable::OwnerItems | SourceTable::ItemTags => {}
        }

        self
    }

    fn owner(&self) -> Option<OwnerFields> {
        present(self.owner_id).map(|id| OwnerFields {
            id,
            name: self.owner_name.clone(),
            created_at: self.owner_created_at.clone(),
        })
    }

    fn item(&self) -> Option<ItemFields> {
        present(self.item_id).map(|id| ItemFields {
            id,
            name: self.item_name.clone(),
            slug: self.item_slug.clone(),
            description: self.item_description.clone(),
            created_at: self.item_created_at.clone(),
            hydrated: false,
        })
    }

    fn tag(&self) -> Option<TagFields> {
        present(self.tag_id).map(|id| TagFields {
            id,
            name: self.tag_name.clone(),
            created_at: self.tag_created_at.clone(),
            hydrated: false,
        })
    }
}

/// Renames source schema columns to their canonical names.
///
/// A payload may carry both names of a column; the canonical one wins unless it is null.
fn canonicalize_columns(mut payload: Value) -> Value {
    if let Value::Object(columns) = &mut payload {
        for (alias, canonical) in COLUMN_ALIASES {
            let Some(value) = columns.remove(*alias) else {
                continue;
            };

            let canonical_is_set = columns
                .get(*canonical)
                .is_some_and(|current| !current.is_null());
            if !canonical_is_set {
                columns.insert((*canonical).to_string(), value);
            }
        }
    }

    payload
}

/// Treats the source's zero value as an absent id.
fn present(id: Option<i64>) -> Option<i64> {
    id.filter(|id| *id != 0)
}

/// Projects a decoded envelope into a normalized [`EntityChange`].
///
/// Fails with [`ErrorKind::UnknownTable`] for tables that are not mirrored and with
/// [`ErrorKind::PayloadProjectionFailed`] when the payload does not fit the table's shape.
pub fn project_envelope(envelope: ChangeEnvelope) -> SyncResult<EntityChange> {
    let Some(table) = SourceTable::from_name(&envelope.table) else {
        bail!(
            ErrorKind::UnknownTable,
            "change message targets an unknown table",
            format!("table `{}`", envelope.table)
        );
    };

    let payload = canonicalize_columns(envelope.payload);
    let row: RawRow = serde_json::from_value(payload).map_err(|err| {
        SyncError::from((
            ErrorKind::PayloadProjectionFailed,
            "row payload does not match the table shape",
            format!("table `{table}`: {err}"),
        ))
        .with_source(err)
    })?;
    let row = row.lift(table);

    match envelope.operation {
        Operation::Delete => project_delete(table, &row),
        operation => project_upsert(table, operation, &row).map(EntityChange::Upsert),
    }
}

fn project_delete(table: SourceTable, row: &RawRow) -> SyncResult<EntityChange> {
    let change = match table {
        SourceTable::Owners => present(row.owner_id)
            .map(|owner_id| EntityChange::OwnerDeleted(OwnerDelete { owner_id })),
        SourceTable::Items => {
            present(row.item_id).map(|item_id| EntityChange::ItemDeleted(ItemDelete { item_id }))
        }
        SourceTable::Tags => {
            present(row.tag_id).map(|tag_id| EntityChange::TagDeleted(TagDelete { tag_id }))
        }
        SourceTable::OwnerItems => present(row.owner_id)
            .zip(present(row.item_id))
            .map(|(owner_id, item_id)| EntityChange::ItemDetached(ItemDetach { owner_id, item_id })),
        SourceTable::ItemTags => present(row.item_id)
            .zip(present(row.tag_id))
            .map(|(item_id, tag_id)| EntityChange::TagDetached(TagDetach { item_id, tag_id })),
    };

    change.ok_or_else(|| {
        SyncError::from((
            ErrorKind::PayloadProjectionFailed,
            "delete row is missing its identifying ids",
            format!("table `{table}`"),
        ))
    })
}

fn project_upsert(
    table: SourceTable,
    operation: Operation,
    row: &RawRow,
) -> SyncResult<RowUpsert> {
    let upsert = RowUpsert {
        operation,
        owner: row.owner(),
        item: row.item(),
        tag: row.tag(),
    };

    let complete = match table {
        SourceTable::OwnerItems => upsert.owner.is_some() && upsert.item.is_some(),
        SourceTable::ItemTags => upsert.item.is_some() && upsert.tag.is_some(),
        SourceTable::Owners | SourceTable::Items | SourceTable::Tags => {
            upsert.owner.is_some() || upsert.item.is_some() || upsert.tag.is_some()
        }
    };

    if !complete {
        bail!(
            ErrorKind::PayloadProjectionFailed,
            "row is missing the ids required by its table",
            format!("table `{table}`, operation `{operation}`")
        );
    }

    Ok(upsert)
}
