use serde::{Deserialize, Serialize};

pub mod health_check;
pub mod index;
pub mod metrics;
pub mod search;

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
}
