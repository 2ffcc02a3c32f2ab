use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{ErrorKind, SyncResult};
use crate::store::DocumentStore;
use crate::sync_error;
use crate::types::{Document, ItemId, OwnerId, SearchResult, TagId};

#[derive(Debug, Default)]
struct Faults {
    failing_owners: HashSet<OwnerId>,
    fail_reads: bool,
    write_delay: Option<Duration>,
}

/// [`DocumentStore`] wrapper injecting failures and latency into the wrapped store.
#[derive(Debug, Clone)]
pub struct FaultyStore<S> {
    store: S,
    faults: Arc<RwLock<Faults>>,
}

impl<S> FaultyStore<S> {
    pub fn wrap(store: S) -> Self {
        Self {
            store,
            faults: Arc::new(RwLock::new(Faults::default())),
        }
    }

    pub fn wrapped(&self) -> &S {
        &self.store
    }

    /// Makes every write of `owner_id`'s document fail.
    pub fn fail_writes_for(&self, owner_id: OwnerId) {
        self.faults.write().unwrap().failing_owners.insert(owner_id);
    }

    /// Makes every read fail, or stops doing so.
    pub fn fail_reads(&self, fail: bool) {
        self.faults.write().unwrap().fail_reads = fail;
    }

    /// Delays every write by `delay`.
    pub fn delay_writes(&self, delay: Duration) {
        self.faults.write().unwrap().write_delay = Some(delay);
    }

    async fn before_write(&self, owner_id: OwnerId) -> SyncResult<()> {
        let (failing, delay) = {
            let faults = self.faults.read().unwrap();
            (faults.failing_owners.contains(&owner_id), faults.write_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if failing {
            return Err(sync_error!(
                ErrorKind::StoreWriteFailed,
                "injected write failure",
                format!("owner {owner_id}")
            ));
        }

        Ok(())
    }

    fn before_read(&self) -> SyncResult<()> {
        if self.faults.read().unwrap().fail_reads {
            return Err(sync_error!(ErrorKind::StoreReadFailed, "injected read failure"));
        }

        Ok(())
    }
}

impl<S> DocumentStore for FaultyStore<S>
where
    S: DocumentStore + Send + Sync,
{
    fn name() -> &'static str {
        S::name()
    }

    async fn create(&self, document: Document) -> SyncResult<()> {
        self.before_write(document.id).await?;
        self.store.create(document).await
    }

    async fn get(&self, owner_id: OwnerId) -> SyncResult<Option<Document>> {
        self.before_read()?;
        self.store.get(owner_id).await
    }

    async fn find_by_item(&self, item_id: ItemId) -> SyncResult<Vec<Document>> {
        self.before_read()?;
        self.store.find_by_item(item_id).await
    }

    async fn find_by_tag(&self, tag_id: TagId) -> SyncResult<Vec<Document>> {
        self.before_read()?;
        self.store.find_by_tag(tag_id).await
    }

    async fn update(&self, document: Document) -> SyncResult<()> {
        self.before_write(document.id).await?;
        self.store.update(document).await
    }

    async fn delete(&self, owner_id: OwnerId) -> SyncResult<()> {
        self.before_write(owner_id).await?;
        self.store.delete(owner_id).await
    }

    async fn search_by_tag_name(&self, tag_name: &str) -> SyncResult<Vec<SearchResult>> {
        self.before_read()?;
        self.store.search_by_tag_name(tag_name).await
    }

    async fn fuzzy_search(&self, text: &str) -> SyncResult<Vec<SearchResult>> {
        self.before_read()?;
        self.store.fuzzy_search(text).await
    }
}
