use std::time::Duration;

use docsync_config::shared::IndexConfig;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::{ErrorKind, SyncResult};
use crate::store::DocumentStore;
use crate::sync_error;
use crate::types::{Document, ItemId, OwnerId, SearchResult, TagId};

/// Maximum number of hits returned by a single search.
const SEARCH_SIZE: usize = 100;

/// Boost of slug and item name matches in fuzzy searches.
const NAME_BOOST: f64 = 2.0;

/// Boost of description matches in fuzzy searches.
const DESCRIPTION_BOOST: f64 = 1.0;

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: Document,
}

/// [`DocumentStore`] backed by an Elasticsearch index.
///
/// Writes ask the index to refresh before answering, so the next change of the same owner
/// resolves against what the previous one wrote.
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: Client,
    base_url: String,
    index: String,
    username: Option<String>,
    password: Option<SecretString>,
}

impl ElasticsearchStore {
    pub fn new(config: IndexConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| {
                sync_error!(
                    ErrorKind::StoreConnectionFailed,
                    "failed to build index client",
                    source: err
                )
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index,
            username: config.username,
            password: config.password,
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Creates the index with its nested mapping when it does not exist yet.
    pub async fn ensure_index(&self) -> SyncResult<()> {
        let response = self.request(Method::HEAD, "").send().await?;
        if response.status().is_success() {
            debug!(index = %self.index, "index already exists");
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(sync_error!(
                ErrorKind::StoreConnectionFailed,
                "failed to check the index",
                format!("index {} answered {}", self.index, response.status())
            ));
        }

        let response = self
            .request(Method::PUT, "")
            .json(&index_mapping())
            .send()
            .await?;
        check(response, ErrorKind::StoreWriteFailed, "failed to create the index").await?;

        info!(index = %self.index, "index created");

        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}{path}", self.base_url, self.index);
        let builder = self.client.request(method, url);

        match &self.username {
            Some(username) => builder.basic_auth(
                username,
                self.password.as_ref().map(|password| password.expose_secret()),
            ),
            None => builder,
        }
    }

    async fn search(&self, query: Value) -> SyncResult<Vec<SearchResult>> {
        let response = self
            .request(Method::POST, "/_search")
            .json(&json!({ "size": SEARCH_SIZE, "query": query }))
            .send()
            .await?;
        let response = check(response, ErrorKind::StoreReadFailed, "index search failed").await?;
        let response: SearchResponse = response.json().await?;

        Ok(response
            .hits
            .hits
            .into_iter()
            .map(|hit| SearchResult {
                score: hit.score.unwrap_or(1.0),
                document: hit.source,
            })
            .collect())
    }

    async fn search_documents(&self, query: Value) -> SyncResult<Vec<Document>> {
        let results = self.search(query).await?;

        Ok(results.into_iter().map(|result| result.document).collect())
    }
}

impl DocumentStore for ElasticsearchStore {
    fn name() -> &'static str {
        "elasticsearch"
    }

    async fn create(&self, document: Document) -> SyncResult<()> {
        let response = self
            .request(Method::PUT, &format!("/_doc/{}?refresh=wait_for", document.id))
            .json(&document)
            .send()
            .await?;
        check(response, ErrorKind::StoreWriteFailed, "failed to create document").await?;

        Ok(())
    }

    async fn get(&self, owner_id: OwnerId) -> SyncResult<Option<Document>> {
        let response = self
            .request(Method::GET, &format!("/_doc/{owner_id}"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check(response, ErrorKind::StoreReadFailed, "failed to get document").await?;
        let response: GetResponse = response.json().await?;

        Ok(response.source.filter(|_| response.found))
    }

    async fn find_by_item(&self, item_id: ItemId) -> SyncResult<Vec<Document>> {
        self.search_documents(json!({
            "nested": {
                "path": "items",
                "query": { "term": { "items.id": item_id } }
            }
        }))
        .await
    }

    async fn find_by_tag(&self, tag_id: TagId) -> SyncResult<Vec<Document>> {
        self.search_documents(json!({
            "nested": {
                "path": "items.tags",
                "query": { "term": { "items.tags.id": tag_id } }
            }
        }))
        .await
    }

    async fn update(&self, document: Document) -> SyncResult<()> {
        let response = self
            .request(
                Method::POST,
                &format!("/_update/{}?refresh=wait_for", document.id),
            )
            .json(&json!({ "doc": document }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(sync_error!(
                ErrorKind::DocumentNotFound,
                "document to update does not exist",
                format!("owner {}", document.id)
            ));
        }

        check(response, ErrorKind::StoreWriteFailed, "failed to update document").await?;

        Ok(())
    }

    async fn delete(&self, owner_id: OwnerId) -> SyncResult<()> {
        let response = self
            .request(Method::DELETE, &format!("/_doc/{owner_id}?refresh=wait_for"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(owner_id, "document to delete does not exist");
            return Ok(());
        }

        check(response, ErrorKind::StoreWriteFailed, "failed to delete document").await?;

        Ok(())
    }

    async fn search_by_tag_name(&self, tag_name: &str) -> SyncResult<Vec<SearchResult>> {
        let results = self
            .search(json!({
                "nested": {
                    "path": "items.tags",
                    "query": { "term": { "items.tags.name.keyword": tag_name } }
                }
            }))
            .await?;

        Ok(results
            .into_iter()
            .map(|result| SearchResult {
                score: 1.0,
                document: result.document,
            })
            .collect())
    }

    async fn fuzzy_search(&self, text: &str) -> SyncResult<Vec<SearchResult>> {
        self.search(json!({
            "nested": {
                "path": "items",
                "score_mode": "max",
                "query": {
                    "bool": {
                        "should": [
                            { "match": { "items.slug": { "query": text, "fuzziness": "AUTO", "boost": NAME_BOOST } } },
                            { "match": { "items.name": { "query": text, "fuzziness": "AUTO", "boost": NAME_BOOST } } },
                            { "match": { "items.description": { "query": text, "fuzziness": "AUTO", "boost": DESCRIPTION_BOOST } } }
                        ],
                        "minimum_should_match": 1
                    }
                }
            }
        }))
        .await
    }
}

/// Turns a non-success response into an error of `kind`, keeping the response body as detail.
async fn check(
    response: Response,
    kind: ErrorKind,
    description: &'static str,
) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();

    Err(sync_error!(kind, description, format!("status {status}: {body}")))
}

/// Mapping with items and their tags nested, so queries match fields of one item together.
fn index_mapping() -> Value {
    let text_with_keyword = json!({
        "type": "text",
        "fields": { "keyword": { "type": "keyword", "ignore_above": 256 } }
    });

    json!({
        "mappings": {
            "properties": {
                "id": { "type": "long" },
                "name": text_with_keyword,
                "created_at": { "type": "keyword" },
                "items": {
                    "type": "nested",
                    "properties": {
                        "id": { "type": "long" },
                        "name": text_with_keyword,
                        "slug": text_with_keyword,
                        "description": { "type": "text" },
                        "created_at": { "type": "keyword" },
                        "tags": {
                            "type": "nested",
                            "properties": {
                                "id": { "type": "long" },
                                "name": text_with_keyword,
                                "created_at": { "type": "keyword" }
                            }
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IndexConfig {
        IndexConfig {
            url: "http://localhost:9200/".to_string(),
            index: "root".to_string(),
            username: None,
            password: None,
            request_timeout_ms: 1_000,
        }
    }

    #[test]
    fn base_url_is_normalized() {
        let store = ElasticsearchStore::new(config()).unwrap();

        assert_eq!(store.base_url, "http://localhost:9200");
        assert_eq!(store.index(), "root");
    }

    #[test]
    fn mapping_nests_items_and_tags() {
        let mapping = index_mapping();
        let items = &mapping["mappings"]["properties"]["items"];

        assert_eq!(items["type"], "nested");
        assert_eq!(items["properties"]["tags"]["type"], "nested");
        assert_eq!(
            items["properties"]["tags"]["properties"]["name"]["fields"]["keyword"]["type"],
            "keyword"
        );
    }
}
