use tracing::debug;

use crate::error::SyncResult;
use crate::store::DocumentStore;
use crate::types::{Document, OwnerId, SearchResult};

/// Read-only facade over a [`DocumentStore`].
///
/// Every query degrades to an empty result when nothing matches. Validating the raw input
/// (for example parsing an owner id) is left to the caller.
#[derive(Debug, Clone)]
pub struct QueryService<S> {
    store: S,
}

impl<S> QueryService<S>
where
    S: DocumentStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the document of `owner_id`, if any.
    pub async fn find_by_owner(&self, owner_id: OwnerId) -> SyncResult<Option<Document>> {
        debug!(owner_id, "querying document by owner");

        self.store.get(owner_id).await
    }

    /// Returns every document with an item tagged exactly `tag_name`.
    pub async fn find_by_tag(&self, tag_name: &str) -> SyncResult<Vec<SearchResult>> {
        debug!(tag_name, "querying documents by tag name");

        self.store.search_by_tag_name(tag_name).await
    }

    /// Returns documents whose items approximately match `text`, best match first.
    pub async fn fuzzy_search(&self, text: &str) -> SyncResult<Vec<SearchResult>> {
        debug!(text, "running fuzzy search");

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        self.store.fuzzy_search(text).await
    }
}
