use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::query::fuzzy;
use crate::store::DocumentStore;
use crate::types::{Document, ItemId, OwnerId, SearchResult, TagId};

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<OwnerId, Document>,
}

/// In-memory [`DocumentStore`] for tests, development and embedding.
///
/// Documents live in a map ordered by owner id, so multi-document reads return them in id
/// order. Fuzzy search is scored locally with [`fuzzy::score_document`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored document, ordered by owner id.
    pub async fn documents(&self) -> Vec<Document> {
        let inner = self.inner.lock().await;
        inner.documents.values().cloned().collect()
    }

    /// Returns a copy of the document of `owner_id`.
    pub async fn document(&self, owner_id: OwnerId) -> Option<Document> {
        let inner = self.inner.lock().await;
        inner.documents.get(&owner_id).cloned()
    }

    /// Inserts or replaces a document directly, bypassing the merge engine.
    pub async fn insert(&self, document: Document) {
        let mut inner = self.inner.lock().await;
        inner.documents.insert(document.id, document);
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.documents.clear();
    }

    async fn find(&self, predicate: impl Fn(&Document) -> bool) -> Vec<Document> {
        let inner = self.inner.lock().await;
        inner
            .documents
            .values()
            .filter(|document| predicate(document))
            .cloned()
            .collect()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn name() -> &'static str {
        "memory"
    }

    async fn create(&self, document: Document) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        debug!(owner_id = document.id, "creating document");
        inner.documents.insert(document.id, document);

        Ok(())
    }

    async fn get(&self, owner_id: OwnerId) -> SyncResult<Option<Document>> {
        Ok(self.document(owner_id).await)
    }

    async fn find_by_item(&self, item_id: ItemId) -> SyncResult<Vec<Document>> {
        Ok(self
            .find(|document| document.contains_item(item_id))
            .await)
    }

    async fn find_by_tag(&self, tag_id: TagId) -> SyncResult<Vec<Document>> {
        Ok(self.find(|document| document.contains_tag(tag_id)).await)
    }

    async fn update(&self, document: Document) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        let Some(stored) = inner.documents.get_mut(&document.id) else {
            bail!(
                ErrorKind::DocumentNotFound,
                "document to update does not exist",
                format!("owner {}", document.id)
            );
        };

        debug!(owner_id = document.id, "updating document");
        *stored = document;

        Ok(())
    }

    async fn delete(&self, owner_id: OwnerId) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        debug!(owner_id, "deleting document");
        inner.documents.remove(&owner_id);

        Ok(())
    }

    async fn search_by_tag_name(&self, tag_name: &str) -> SyncResult<Vec<SearchResult>> {
        let documents = self
            .find(|document| document.contains_tag_name(tag_name))
            .await;

        Ok(documents
            .into_iter()
            .map(|document| SearchResult {
                score: 1.0,
                document,
            })
            .collect())
    }

    async fn fuzzy_search(&self, text: &str) -> SyncResult<Vec<SearchResult>> {
        let terms = fuzzy::tokenize(text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let inner = self.inner.lock().await;
        let mut results = inner
            .documents
            .values()
            .filter_map(|document| {
                fuzzy::score_document(&terms, document).map(|score| SearchResult {
                    score,
                    document: document.clone(),
                })
            })
            .collect::<Vec<_>>();
        fuzzy::rank(&mut results);

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Item, Tag};

    fn document(id: OwnerId, tag_name: &str) -> Document {
        let mut item = Item::new(id * 10);
        item.tags.push(Tag {
            id: id * 100,
            name: tag_name.to_string(),
            created_at: String::new(),
        });

        Document {
            items: vec![item],
            ..Document::new(id)
        }
    }

    #[tokio::test]
    async fn nested_lookups_find_containing_documents() {
        let store = MemoryDocumentStore::new();
        store.create(document(1, "go")).await.unwrap();
        store.create(document(2, "rust")).await.unwrap();

        let by_item = store.find_by_item(20).await.unwrap();
        assert_eq!(by_item.len(), 1);
        assert_eq!(by_item[0].id, 2);

        let by_tag = store.find_by_tag(100).await.unwrap();
        assert_eq!(by_tag[0].id, 1);

        let by_name = store.search_by_tag_name("rust").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].document.id, 2);
        assert!(store.search_by_tag_name("ru").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let store = MemoryDocumentStore::new();

        let err = store.update(Document::new(1)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DocumentNotFound);
    }

    #[tokio::test]
    async fn delete_of_missing_document_succeeds() {
        let store = MemoryDocumentStore::new();

        store.delete(1).await.unwrap();

        assert!(store.documents().await.is_empty());
    }
}
