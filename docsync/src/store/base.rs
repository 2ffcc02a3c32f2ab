use std::future::Future;

use crate::error::SyncResult;
use crate::types::{Document, ItemId, OwnerId, SearchResult, TagId};

/// Storage of owner documents, backed by a document or search index.
///
/// Documents are keyed by owner id. Reads that find nothing return `None` or an empty list
/// rather than an error. Implementations are shared by every partition worker and the query
/// service, so they must be safe to call concurrently; no lock is held across calls.
///
/// The trait provides a default no-op [`DocumentStore::shutdown`]; override it when the store
/// holds resources that must be released.
pub trait DocumentStore {
    /// Returns the name of the store.
    fn name() -> &'static str;

    /// Releases resources held by the store.
    fn shutdown(&self) -> impl Future<Output = SyncResult<()>> + Send {
        async { Ok(()) }
    }

    /// Stores a new document under its owner id.
    fn create(&self, document: Document) -> impl Future<Output = SyncResult<()>> + Send;

    /// Fetches the document of an owner.
    fn get(&self, owner_id: OwnerId) -> impl Future<Output = SyncResult<Option<Document>>> + Send;

    /// Fetches every document containing the item.
    fn find_by_item(
        &self,
        item_id: ItemId,
    ) -> impl Future<Output = SyncResult<Vec<Document>>> + Send;

    /// Fetches every document containing an item that carries the tag.
    fn find_by_tag(&self, tag_id: TagId) -> impl Future<Output = SyncResult<Vec<Document>>> + Send;

    /// Replaces a stored document with `document`.
    fn update(&self, document: Document) -> impl Future<Output = SyncResult<()>> + Send;

    /// Deletes the document of an owner. Deleting a missing document succeeds.
    fn delete(&self, owner_id: OwnerId) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns documents with an item tagged exactly `tag_name`.
    fn search_by_tag_name(
        &self,
        tag_name: &str,
    ) -> impl Future<Output = SyncResult<Vec<SearchResult>>> + Send;

    /// Returns documents whose items approximately match `text`, best match first.
    fn fuzzy_search(
        &self,
        text: &str,
    ) -> impl Future<Output = SyncResult<Vec<SearchResult>>> + Send;
}
