use serde::Deserialize;

use crate::Config;
use crate::shared::{IndexConfig, PipelineConfig, SourceConfig, ValidationError};

/// Configuration of the replicator service.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicatorConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub index: IndexConfig,
    /// Port of the Prometheus exporter, disabled when absent.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl ReplicatorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pipeline.validate()?;
        self.source.validate()?;
        self.index.validate()?;

        Ok(())
    }
}

impl Config for ReplicatorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
