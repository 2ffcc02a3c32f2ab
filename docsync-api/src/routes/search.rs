use actix_web::{
    HttpResponse, ResponseError,
    http::{StatusCode, header::ContentType},
    web::{Data, Path},
};
use docsync::error::SyncError;
use docsync::query::QueryService;
use docsync::store::DocumentStore;
use thiserror::Error;
use tracing::error;

use crate::routes::ErrorMessage;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("The owner id `{0}` is not a number")]
    InvalidOwnerId(String),

    #[error(transparent)]
    Store(#[from] SyncError),
}

impl SearchError {
    pub fn to_message(&self) -> String {
        match self {
            // Store failures may carry index internals.
            SearchError::Store(_) => "internal server error".to_string(),
            e => e.to_string(),
        }
    }
}

impl ResponseError for SearchError {
    fn status_code(&self) -> StatusCode {
        match self {
            SearchError::InvalidOwnerId(_) => StatusCode::BAD_REQUEST,
            SearchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let SearchError::Store(err) = self {
            error!(error = %err, "search failed");
        }

        let error_message = ErrorMessage {
            error: self.to_message(),
        };
        let body = serde_json::to_string(&error_message)
            .unwrap_or_else(|_| r#"{"error":"internal server error"}"#.to_string());

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(body)
    }
}

/// Returns the document of an owner, or `null` when there is none.
pub async fn find_by_owner<S>(
    service: Data<QueryService<S>>,
    owner_id: Path<String>,
) -> Result<HttpResponse, SearchError>
where
    S: DocumentStore + 'static,
{
    let owner_id = owner_id.into_inner();
    let owner_id = owner_id
        .parse()
        .map_err(|_| SearchError::InvalidOwnerId(owner_id))?;

    let document = service.find_by_owner(owner_id).await?;

    Ok(HttpResponse::Ok().json(document))
}

/// Returns the documents with an item tagged exactly with the given name.
pub async fn find_by_tag<S>(
    service: Data<QueryService<S>>,
    tag: Path<String>,
) -> Result<HttpResponse, SearchError>
where
    S: DocumentStore + 'static,
{
    let results = service.find_by_tag(&tag).await?;

    Ok(HttpResponse::Ok().json(results))
}

/// Returns the documents approximately matching the query, best match first.
pub async fn fuzzy_search<S>(
    service: Data<QueryService<S>>,
    query: Path<String>,
) -> Result<HttpResponse, SearchError>
where
    S: DocumentStore + 'static,
{
    let results = service.fuzzy_search(&query).await?;

    Ok(HttpResponse::Ok().json(results))
}
