use serde::Deserialize;

use crate::shared::{PgConnectionConfig, ValidationError};

/// Where change notifications are read from.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub connection: PgConnectionConfig,
    /// Name of the `LISTEN` channel the source triggers notify on.
    pub channel: String,
    #[serde(default = "default_min_reconnect_interval_ms")]
    pub min_reconnect_interval_ms: u64,
    #[serde(default = "default_max_reconnect_interval_ms")]
    pub max_reconnect_interval_ms: u64,
}

impl SourceConfig {
    pub const DEFAULT_MIN_RECONNECT_INTERVAL_MS: u64 = 1_000;

    pub const DEFAULT_MAX_RECONNECT_INTERVAL_MS: u64 = 2_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate()?;

        if self.channel.is_empty() {
            return Err(ValidationError::EmptyValue("source.channel"));
        }

        if self.min_reconnect_interval_ms > self.max_reconnect_interval_ms {
            return Err(ValidationError::ReconnectIntervalInverted {
                min: self.min_reconnect_interval_ms,
                max: self.max_reconnect_interval_ms,
            });
        }

        Ok(())
    }
}

fn default_min_reconnect_interval_ms() -> u64 {
    SourceConfig::DEFAULT_MIN_RECONNECT_INTERVAL_MS
}

fn default_max_reconnect_interval_ms() -> u64 {
    SourceConfig::DEFAULT_MAX_RECONNECT_INTERVAL_MS
}
