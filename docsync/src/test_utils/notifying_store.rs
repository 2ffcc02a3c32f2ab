use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::error::SyncResult;
use crate::store::DocumentStore;
use crate::test_utils::notify::TimedNotify;
use crate::types::{Document, ItemId, OwnerId, SearchResult, TagId};

type WritesCondition = Box<dyn Fn(u64) -> bool + Send + Sync>;

#[derive(Default)]
struct Inner {
    writes: u64,
    conditions: Vec<(WritesCondition, Arc<Notify>)>,
}

impl Inner {
    fn record_write(&mut self) {
        self.writes += 1;
        self.check_conditions();
    }

    fn check_conditions(&mut self) {
        let writes = self.writes;
        self.conditions.retain(|(condition, notify)| {
            let reached = condition(writes);
            if reached {
                notify.notify_one();
            }
            !reached
        });
    }
}

/// [`DocumentStore`] wrapper counting the writes that reach the wrapped store.
///
/// Tests register a target number of writes and await it instead of sleeping. Only successful
/// creates, updates and deletes are counted.
#[derive(Clone)]
pub struct NotifyingStore<S> {
    store: S,
    inner: Arc<Mutex<Inner>>,
}

impl<S> NotifyingStore<S> {
    pub fn wrap(store: S) -> Self {
        Self {
            store,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn wrapped(&self) -> &S {
        &self.store
    }

    /// Returns the number of successful writes so far.
    pub async fn writes(&self) -> u64 {
        self.inner.lock().await.writes
    }

    /// Returns a notification fired once at least `count` writes succeeded.
    pub async fn wait_for_writes(&self, count: u64) -> TimedNotify {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.lock().await;
        inner
            .conditions
            .push((Box::new(move |writes| writes >= count), notify.clone()));
        inner.check_conditions();

        TimedNotify::new(notify)
    }

    async fn record<T>(&self, result: SyncResult<T>) -> SyncResult<T> {
        if result.is_ok() {
            self.inner.lock().await.record_write();
        }

        result
    }
}

impl<S: fmt::Debug> fmt::Debug for NotifyingStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyingStore")
            .field("store", &self.store)
            .finish()
    }
}

impl<S> DocumentStore for NotifyingStore<S>
where
    S: DocumentStore + Send + Sync,
{
    fn name() -> &'static str {
        S::name()
    }

    async fn create(&self, document: Document) -> SyncResult<()> {
        let result = self.store.create(document).await;
        self.record(result).await
    }

    async fn get(&self, owner_id: OwnerId) -> SyncResult<Option<Document>> {
        self.store.get(owner_id).await
    }

    async fn find_by_item(&self, item_id: ItemId) -> SyncResult<Vec<Document>> {
        self.store.find_by_item(item_id).await
    }

    async fn find_by_tag(&self, tag_id: TagId) -> SyncResult<Vec<Document>> {
        self.store.find_by_tag(tag_id).await
    }

    async fn update(&self, document: Document) -> SyncResult<()> {
        let result = self.store.update(document).await;
        self.record(result).await
    }

    async fn delete(&self, owner_id: OwnerId) -> SyncResult<()> {
        let result = self.store.delete(owner_id).await;
        self.record(result).await
    }

    async fn search_by_tag_name(&self, tag_name: &str) -> SyncResult<Vec<SearchResult>> {
        self.store.search_by_tag_name(tag_name).await
    }

    async fn fuzzy_search(&self, text: &str) -> SyncResult<Vec<SearchResult>> {
        self.store.fuzzy_search(text).await
    }
}
