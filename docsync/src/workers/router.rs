use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use crate::conversions::envelope::decode_envelope;
use crate::conversions::row::project_envelope;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::metrics::{
    DOCSYNC_CHANGES_ROUTED_TOTAL, DOCSYNC_EVENTS_FAILED_TOTAL, DOCSYNC_MESSAGES_DROPPED_TOTAL,
    DOCSYNC_MESSAGES_RECEIVED_TOTAL, ERROR_KIND_LABEL, PARTITION_LABEL, REASON_LABEL,
};
use crate::store::DocumentStore;
use crate::sync_error;
use crate::types::{EntityChange, ItemFields, ItemId, OwnerId, TagFields, TagId};
use crate::workers::base::{Worker, WorkerHandle, WorkerType};
use crate::workers::partition::RoutedChange;

/// Returns the partition owning the document of `owner_id`.
pub fn partition_for(owner_id: OwnerId, partitions: u16) -> u16 {
    owner_id.rem_euclid(i64::from(partitions.max(1))) as u16
}

/// Relations and attributes learned from the rows routed so far.
///
/// The table answers for what the partitions may not have written to the store yet, so a
/// change following an attach in the stream reaches the owner of the attach, and an attach
/// of an item materialized by another partition carries the item's attributes.
///
/// Only attributes carried by routed rows are remembered, never defaults. Every map keeps at
/// most `capacity` entries and evicts the least recently used one; a forgotten id is resolved
/// through the store instead.
#[derive(Debug)]
pub struct RoutingTable {
    item_owners: LruCache<ItemId, HashSet<OwnerId>>,
    tag_items: LruCache<TagId, HashSet<ItemId>>,
    items: LruCache<ItemId, ItemFields>,
    tags: LruCache<TagId, TagFields>,
}

impl RoutingTable {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            item_owners: LruCache::new(capacity),
            tag_items: LruCache::new(capacity),
            items: LruCache::new(capacity),
            tags: LruCache::new(capacity),
        }
    }

    /// Fills the bare item and tag of an attach row with the attributes seen so far.
    ///
    /// Filled attributes are marked as hydrated, so the merge engine completes the ones still
    /// unknown from the store and never lets them overwrite an existing item or tag.
    pub fn hydrate(&mut self, change: &mut EntityChange) {
        let EntityChange::Upsert(row) = change else {
            return;
        };

        if row.owner.is_some()
            && let Some(item_fields) = row.item.as_mut()
            && item_fields.is_bare()
            && let Some(known) = self.items.get(&item_fields.id)
        {
            item_fields.absorb(known);
            item_fields.hydrated = true;
        }

        if row.item.is_some()
            && let Some(tag_fields) = row.tag.as_mut()
            && tag_fields.is_bare()
            && let Some(known) = self.tags.get(&tag_fields.id)
        {
            tag_fields.absorb(known);
            tag_fields.hydrated = true;
        }
    }

    /// Returns the owners known to contain the item.
    pub fn owners_of_item(&self, item_id: ItemId) -> impl Iterator<Item = OwnerId> + '_ {
        self.item_owners
            .peek(&item_id)
            .into_iter()
            .flat_map(|owners| owners.iter().copied())
    }

    /// Returns the owners known to contain an item carrying the tag.
    pub fn owners_of_tag(&self, tag_id: TagId) -> impl Iterator<Item = OwnerId> + '_ {
        self.tag_items
            .peek(&tag_id)
            .into_iter()
            .flat_map(|items| items.iter())
            .flat_map(move |item_id| self.owners_of_item(*item_id))
    }

    /// Records the relations added or removed by `change`.
    pub fn learn(&mut self, change: &EntityChange) {
        match change {
            EntityChange::Upsert(row) => {
                if let Some(item) = row.item.as_ref().filter(|item| carries_attributes(item)) {
                    self.items
                        .get_or_insert_mut(item.id, || ItemFields::new(item.id))
                        .absorb(item);
                }
                if let Some(tag) = row
                    .tag
                    .as_ref()
                    .filter(|tag| !tag.hydrated && !tag.is_bare())
                {
                    self.tags
                        .get_or_insert_mut(tag.id, || TagFields::new(tag.id))
                        .absorb(tag);
                }
                if let (Some(owner), Some(item)) = (&row.owner, &row.item) {
                    self.item_owners
                        .get_or_insert_mut(item.id, HashSet::new)
                        .insert(owner.id);
                }
                if let (Some(item), Some(tag)) = (&row.item, &row.tag) {
                    self.tag_items
                        .get_or_insert_mut(tag.id, HashSet::new)
                        .insert(item.id);
                }
            }
            EntityChange::OwnerDeleted(change) => {
                forget_everywhere(&mut self.item_owners, &change.owner_id);
            }
            EntityChange::ItemDeleted(change) => {
                self.items.pop(&change.item_id);
                self.item_owners.pop(&change.item_id);
                forget_everywhere(&mut self.tag_items, &change.item_id);
            }
            EntityChange::TagDeleted(change) => {
                self.tags.pop(&change.tag_id);
                self.tag_items.pop(&change.tag_id);
            }
            EntityChange::ItemDetached(change) => {
                forget(&mut self.item_owners, &change.item_id, &change.owner_id);
            }
            EntityChange::TagDetached(change) => {
                forget(&mut self.tag_items, &change.tag_id, &change.item_id);
            }
        }
    }

    /// Returns the number of items whose owners are known.
    pub fn known_items(&self) -> usize {
        self.item_owners.len()
    }
}

/// Returns `true` when the row itself carries attributes of the item.
fn carries_attributes(item: &ItemFields) -> bool {
    !item.hydrated && !item.is_bare()
}

/// Removes `member` from the set of `key`, dropping the set once empty.
fn forget<K, V>(map: &mut LruCache<K, HashSet<V>>, key: &K, member: &V)
where
    K: Hash + Eq,
    V: Hash + Eq,
{
    let emptied = map.peek_mut(key).is_some_and(|members| {
        members.remove(member);
        members.is_empty()
    });
    if emptied {
        map.pop(key);
    }
}

/// Removes `member` from every set, dropping the sets left empty.
fn forget_everywhere<K, V>(map: &mut LruCache<K, HashSet<V>>, member: &V)
where
    K: Hash + Eq + Clone,
    V: Hash + Eq,
{
    let emptied = map
        .iter_mut()
        .filter_map(|(key, members)| {
            members.remove(member);
            members.is_empty().then(|| key.clone())
        })
        .collect::<Vec<_>>();
    for key in emptied {
        map.pop(&key);
    }
}

/// Counters of the router, shared with its handle.
#[derive(Debug, Clone, Default)]
pub struct RouterWorkerState {
    received: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    routed: Arc<AtomicU64>,
}

impl RouterWorkerState {
    /// Returns the number of messages read from the transport queue.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Returns the number of messages dropped before reaching a partition.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of routed changes, counting every copy of a fanned out change.
    pub fn routed(&self) -> u64 {
        self.routed.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct RouterWorkerHandle {
    state: RouterWorkerState,
    handle: Option<JoinHandle<SyncResult<()>>>,
}

impl RouterWorkerHandle {
    /// Waits for the router without consuming the handle.
    pub async fn join(&mut self) -> SyncResult<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };

        let result = handle.await;
        self.handle = None;

        result.map_err(|err| {
            if err.is_cancelled() {
                sync_error!(ErrorKind::WorkerPanic, "router worker was aborted")
            } else {
                sync_error!(ErrorKind::WorkerPanic, "router worker panicked", source: err)
            }
        })?
    }

    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

impl WorkerHandle<RouterWorkerState> for RouterWorkerHandle {
    fn state(&self) -> RouterWorkerState {
        self.state.clone()
    }

    async fn wait(mut self) -> SyncResult<()> {
        self.join().await
    }
}

/// Worker turning raw messages into changes and routing them to partitions.
///
/// Messages are handled one at a time in arrival order. A message that cannot be decoded or
/// projected is logged and dropped. The router stops once the transport queue is closed and
/// drained, dropping the partition senders so that partitions drain in turn.
#[derive(Debug)]
pub struct RouterWorker<S> {
    store: S,
    rx: mpsc::Receiver<String>,
    partitions: Vec<mpsc::Sender<RoutedChange>>,
    table_capacity: usize,
}

impl<S> RouterWorker<S> {
    pub fn new(
        store: S,
        rx: mpsc::Receiver<String>,
        partitions: Vec<mpsc::Sender<RoutedChange>>,
        table_capacity: usize,
    ) -> Self {
        Self {
            store,
            rx,
            partitions,
            table_capacity,
        }
    }
}

impl<S> Worker<RouterWorkerHandle, RouterWorkerState> for RouterWorker<S>
where
    S: DocumentStore + Send + Sync + 'static,
{
    type Error = SyncError;

    async fn start(self) -> SyncResult<RouterWorkerHandle> {
        if self.partitions.is_empty() {
            return Err(sync_error!(
                ErrorKind::InvalidState,
                "router started without partitions"
            ));
        }

        let Some(table_capacity) = NonZeroUsize::new(self.table_capacity) else {
            return Err(sync_error!(
                ErrorKind::ConfigError,
                "routing table capacity must be greater than 0"
            ));
        };

        let state = RouterWorkerState::default();
        let router = Router {
            store: self.store,
            partitions: self.partitions,
            table: RoutingTable::new(table_capacity),
            state: state.clone(),
        };

        let span = tracing::info_span!("router_worker");
        let worker = router.run(self.rx).instrument(span);

        Ok(RouterWorkerHandle {
            state,
            handle: Some(tokio::spawn(worker)),
        })
    }
}

struct Router<S> {
    store: S,
    partitions: Vec<mpsc::Sender<RoutedChange>>,
    table: RoutingTable,
    state: RouterWorkerState,
}

impl<S> Router<S>
where
    S: DocumentStore,
{
    async fn run(mut self, mut rx: mpsc::Receiver<String>) -> SyncResult<()> {
        info!(worker_type = %WorkerType::Router, partitions = self.partitions.len(), "starting router worker");

        while let Some(message) = rx.recv().await {
            self.state.received.fetch_add(1, Ordering::Relaxed);
            counter!(DOCSYNC_MESSAGES_RECEIVED_TOTAL).increment(1);

            let Some(mut change) = self.convert(&message) else {
                self.state.dropped.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            self.table.hydrate(&mut change);

            let owners = match self.owners(&change).await {
                Ok(owners) => owners,
                Err(err) => {
                    error!(change = change.name(), error = %err, "failed to resolve owners of change, dropping it");
                    self.state.dropped.fetch_add(1, Ordering::Relaxed);
                    counter!(DOCSYNC_EVENTS_FAILED_TOTAL, ERROR_KIND_LABEL => err.kind().as_label())
                        .increment(1);
                    continue;
                }
            };

            self.table.learn(&change);

            if owners.is_empty() {
                debug!(change = change.name(), "change touches no known owner, dropping it");
                self.state.dropped.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            for owner_id in owners {
                self.route(owner_id, change.clone()).await?;
            }
        }

        info!("transport queue drained, stopping router worker");

        Ok(())
    }

    fn convert(&self, message: &str) -> Option<EntityChange> {
        let err = match decode_envelope(message).and_then(project_envelope) {
            Ok(change) => return Some(change),
            Err(err) => err,
        };

        let kind = err.kind();
        let reason = if kind.is_decode() {
            "decode"
        } else if kind == ErrorKind::UnknownTable {
            "unknown_table"
        } else if kind.is_projection() {
            "projection"
        } else {
            kind.as_label()
        };
        warn!(reason, error = %err, "dropping message that could not be converted");
        counter!(DOCSYNC_MESSAGES_DROPPED_TOTAL, REASON_LABEL => reason).increment(1);

        None
    }

    /// Resolves the owners whose documents `change` may touch.
    ///
    /// A change naming its owner goes to that owner only. Otherwise the owners come from the
    /// routing table and the store, and may include owners the change turns out not to apply to.
    async fn owners(&self, change: &EntityChange) -> SyncResult<BTreeSet<OwnerId>> {
        let mut owners = BTreeSet::new();

        if let Some(owner_id) = change.owner_id() {
            owners.insert(owner_id);
            return Ok(owners);
        }

        if let Some(item_id) = change.item_id() {
            owners.extend(self.table.owners_of_item(item_id));
            let documents = self.store.find_by_item(item_id).await?;
            owners.extend(documents.iter().map(|document| document.id));
        } else if let Some(tag_id) = change.tag_id() {
            owners.extend(self.table.owners_of_tag(tag_id));
            let documents = self.store.find_by_tag(tag_id).await?;
            owners.extend(documents.iter().map(|document| document.id));
        }

        Ok(owners)
    }

    async fn route(&self, owner_id: OwnerId, change: EntityChange) -> SyncResult<()> {
        let partition = partition_for(owner_id, self.partitions.len() as u16);
        let Some(tx) = self.partitions.get(usize::from(partition)) else {
            return Err(sync_error!(
                ErrorKind::InvalidState,
                "change routed to a missing partition",
                format!("partition {partition}")
            ));
        };

        if tx.send(RoutedChange { owner_id, change }).await.is_err() {
            return Err(sync_error!(
                ErrorKind::InvalidState,
                "partition worker stopped before the router",
                format!("partition {partition}")
            ));
        }

        self.state.routed.fetch_add(1, Ordering::Relaxed);
        counter!(DOCSYNC_CHANGES_ROUTED_TOTAL, PARTITION_LABEL => partition.to_string()).increment(1);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemDetach, Operation, OwnerDelete, OwnerFields, RowUpsert};

    fn table(capacity: usize) -> RoutingTable {
        RoutingTable::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn attach(owner_id: OwnerId, item_id: ItemId) -> EntityChange {
        EntityChange::Upsert(RowUpsert {
            operation: Operation::Insert,
            owner: Some(OwnerFields::new(owner_id)),
            item: Some(ItemFields::new(item_id)),
            tag: None,
        })
    }

    fn tag(item_id: ItemId, tag_id: TagId) -> EntityChange {
        EntityChange::Upsert(RowUpsert {
            operation: Operation::Insert,
            owner: None,
            item: Some(ItemFields::new(item_id)),
            tag: Some(TagFields::new(tag_id)),
        })
    }

    fn item_update(item: ItemFields) -> EntityChange {
        EntityChange::Upsert(RowUpsert {
            operation: Operation::Update,
            owner: None,
            item: Some(item),
            tag: None,
        })
    }

    fn hydrated_item(change: EntityChange) -> ItemFields {
        let EntityChange::Upsert(row) = change else {
            panic!("expected an upsert");
        };

        row.item.unwrap()
    }

    #[test]
    fn table_hydrates_attach_rows_with_seen_attributes_only() {
        let mut table = table(16);
        table.learn(&item_update(ItemFields {
            name: Some("Proj".to_string()),
            ..ItemFields::new(10)
        }));
        table.learn(&item_update(ItemFields {
            description: Some("new".to_string()),
            ..ItemFields::new(10)
        }));

        let mut change = attach(2, 10);
        table.hydrate(&mut change);

        let item = hydrated_item(change);
        assert!(item.hydrated);
        assert_eq!(item.name.as_deref(), Some("Proj"));
        assert_eq!(item.description.as_deref(), Some("new"));
        assert_eq!(item.slug, None);
        assert!(item.needs_hydration());

        let mut unknown = attach(2, 11);
        table.hydrate(&mut unknown);
        assert_eq!(unknown, attach(2, 11));
    }

    #[test]
    fn hydrated_rows_are_not_learned_as_attributes() {
        let mut table = table(16);
        let mut change = item_update(ItemFields {
            name: Some("Borrowed".to_string()),
            hydrated: true,
            ..ItemFields::new(10)
        });
        table.learn(&change);

        change = attach(1, 10);
        table.hydrate(&mut change);

        assert_eq!(change, attach(1, 10));
    }

    #[test]
    fn partitions_are_stable_and_in_range() {
        assert_eq!(partition_for(7, 4), 3);
        assert_eq!(partition_for(8, 4), 0);
        assert_eq!(partition_for(-1, 4), 3);
        assert_eq!(partition_for(42, 1), 0);
    }

    #[test]
    fn table_learns_and_forgets_relations() {
        let mut table = table(16);
        table.learn(&attach(1, 10));
        table.learn(&attach(2, 10));
        table.learn(&tag(10, 100));

        let mut owners = table.owners_of_tag(100).collect::<Vec<_>>();
        owners.sort();
        assert_eq!(owners, vec![1, 2]);

        table.learn(&EntityChange::ItemDetached(ItemDetach {
            owner_id: 1,
            item_id: 10,
        }));
        assert_eq!(table.owners_of_item(10).collect::<Vec<_>>(), vec![2]);

        table.learn(&EntityChange::OwnerDeleted(OwnerDelete { owner_id: 2 }));
        assert_eq!(table.owners_of_item(10).count(), 0);
        assert_eq!(table.owners_of_tag(100).count(), 0);
    }

    #[test]
    fn table_evicts_least_recently_used_items() {
        let mut table = table(2);
        table.learn(&attach(1, 10));
        table.learn(&attach(1, 11));
        table.learn(&attach(2, 10));
        table.learn(&attach(1, 12));

        assert_eq!(table.known_items(), 2);
        assert_eq!(table.owners_of_item(11).count(), 0);
        let mut owners = table.owners_of_item(10).collect::<Vec<_>>();
        owners.sort();
        assert_eq!(owners, vec![1, 2]);
        assert_eq!(table.owners_of_item(12).collect::<Vec<_>>(), vec![1]);
    }
}
