use std::time::Instant;

use metrics::{counter, histogram};
use tracing::debug;

use crate::error::SyncResult;
use crate::merge::{DocumentChange, Target};
use crate::metrics::{CHANGE_LABEL, DOCSYNC_EVENTS_APPLIED_TOTAL, DOCSYNC_MERGE_DURATION_SECONDS};
use crate::store::DocumentStore;
use crate::types::{Document, EntityChange, OwnerId};

/// What applying a change did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new document was created.
    Created,
    /// Existing documents were rewritten.
    Updated { documents: usize },
    /// Existing documents were deleted.
    Deleted { documents: usize },
    /// Documents were found but nothing in them changed, or there was nothing to remove.
    Unchanged,
    /// Nothing was resolved and the change cannot root a new document.
    Skipped,
}

/// Applies normalized entity changes to the documents of a [`DocumentStore`].
///
/// Every change is applied as resolve, then create, merge or delete. A store failure aborts
/// the change where it stands: writes already issued for it are kept and nothing is retried.
#[derive(Debug, Clone)]
pub struct MergeEngine<S> {
    store: S,
}

impl<S> MergeEngine<S>
where
    S: DocumentStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applies `change` to every document it resolves to.
    pub async fn apply(&self, change: EntityChange) -> SyncResult<MergeOutcome> {
        self.apply_scoped(change, None).await
    }

    /// Applies `change` restricted to the document of `scope`, when given.
    ///
    /// Resolved documents of other owners are left alone and a new document is only created
    /// when it is rooted at `scope`. The supervisor uses this to fan a change touching several
    /// owners out to the partitions owning each of them.
    pub async fn apply_scoped(
        &self,
        change: EntityChange,
        scope: Option<OwnerId>,
    ) -> SyncResult<MergeOutcome> {
        let started = Instant::now();

        let change = self.hydrate(change).await?;
        let documents = self.resolve(&change, scope).await?;

        let outcome = if documents.is_empty() {
            self.create(&change, scope).await?
        } else if change.deletes_document() {
            self.delete(&change, documents).await?
        } else {
            self.merge(&change, documents).await?
        };

        debug!(change = change.name(), ?scope, ?outcome, "change applied");

        histogram!(DOCSYNC_MERGE_DURATION_SECONDS, CHANGE_LABEL => change.name())
            .record(started.elapsed().as_secs_f64());
        counter!(DOCSYNC_EVENTS_APPLIED_TOTAL, CHANGE_LABEL => change.name()).increment(1);

        Ok(outcome)
    }

    /// Completes attach rows with the attributes already materialized in another document, so
    /// a newly attached item or tag is not stored blank.
    ///
    /// Only attributes the row does not know yet are filled in, and they are marked as
    /// hydrated so they never overwrite an item or tag the document already holds.
    async fn hydrate(&self, change: EntityChange) -> SyncResult<EntityChange> {
        let mut row = match change {
            EntityChange::Upsert(row) => row,
            other => return Ok(other),
        };

        if row.owner.is_some()
            && let Some(item_fields) = row.item.as_mut()
            && item_fields.needs_hydration()
        {
            let documents = self.store.find_by_item(item_fields.id).await?;
            if let Some(item) = documents
                .iter()
                .find_map(|document| document.item(item_fields.id))
            {
                item_fields.fill_missing_from(item);
            }
        }

        if row.item.is_some()
            && let Some(tag_fields) = row.tag.as_mut()
            && tag_fields.needs_hydration()
        {
            let documents = self.store.find_by_tag(tag_fields.id).await?;
            if let Some(tag) = documents
                .iter()
                .flat_map(|document| document.items.iter())
                .flat_map(|item| item.tags.iter())
                .find(|tag| tag.id == tag_fields.id)
            {
                tag_fields.fill_missing_from(tag);
            }
        }

        Ok(EntityChange::Upsert(row))
    }

    async fn resolve(
        &self,
        change: &EntityChange,
        scope: Option<OwnerId>,
    ) -> SyncResult<Vec<Document>> {
        let documents = match change.target() {
            Some(Target::Owner(owner_id)) => self.store.get(owner_id).await?.into_iter().collect(),
            Some(Target::Item(item_id)) => self.store.find_by_item(item_id).await?,
            Some(Target::Tag(tag_id)) => self.store.find_by_tag(tag_id).await?,
            None => Vec::new(),
        };

        Ok(documents
            .into_iter()
            .filter(|document| scope.is_none_or(|owner_id| document.id == owner_id))
            .collect())
    }

    async fn create(
        &self,
        change: &EntityChange,
        scope: Option<OwnerId>,
    ) -> SyncResult<MergeOutcome> {
        if change.is_removal() {
            debug!(change = change.name(), "nothing to remove");
            return Ok(MergeOutcome::Unchanged);
        }

        let Some(document) = change.seed() else {
            debug!(
                change = change.name(),
                "change resolves to no document and names no owner, skipping"
            );
            return Ok(MergeOutcome::Skipped);
        };

        if scope.is_some_and(|owner_id| owner_id != document.id) {
            return Ok(MergeOutcome::Skipped);
        }

        self.store.create(document).await?;

        Ok(MergeOutcome::Created)
    }

    async fn delete(
        &self,
        change: &EntityChange,
        documents: Vec<Document>,
    ) -> SyncResult<MergeOutcome> {
        let mut deleted = 0;
        for document in documents {
            if !change.applies_to(&document) {
                continue;
            }

            self.store.delete(document.id).await?;
            deleted += 1;
        }

        Ok(MergeOutcome::Deleted { documents: deleted })
    }

    async fn merge(
        &self,
        change: &EntityChange,
        documents: Vec<Document>,
    ) -> SyncResult<MergeOutcome> {
        let mut updated = 0;
        for mut document in documents {
            if !change.applies_to(&document) || !change.merge(&mut document) {
                continue;
            }

            self.store.update(document).await?;
            updated += 1;
        }

        if updated == 0 {
            return Ok(MergeOutcome::Unchanged);
        }

        Ok(MergeOutcome::Updated { documents: updated })
    }
}
