use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Connection settings for the search index that holds the owner documents.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid leaking the password.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Base url of the index cluster, e.g. `http://localhost:9200`.
    pub url: String,
    /// Name of the index holding one document per owner.
    #[serde(default = "default_index_name")]
    pub index: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Timeout applied to every request sent to the index.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl IndexConfig {
    pub const DEFAULT_INDEX_NAME: &'static str = "root";

    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::EmptyValue("index.url"));
        }

        if self.index.is_empty() {
            return Err(ValidationError::EmptyValue("index.index"));
        }

        if self.request_timeout_ms == 0 {
            return Err(ValidationError::ZeroValue("index.request_timeout_ms"));
        }

        Ok(())
    }
}

fn default_index_name() -> String {
    IndexConfig::DEFAULT_INDEX_NAME.to_string()
}

fn default_request_timeout_ms() -> u64 {
    IndexConfig::DEFAULT_REQUEST_TIMEOUT_MS
}
