use serde::Deserialize;

use crate::Config;
use crate::shared::{IndexConfig, ValidationError};

/// Configuration of the query api service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub application: ApplicationSettings,
    pub index: IndexConfig,
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.index.validate()
    }
}

impl Config for ApiConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

/// Address the HTTP server binds to.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}
