use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Settings of the stream supervisor that applies change messages to the index.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Number of sequential partition workers. Changes for the same owner always land on the
    /// same partition; `1` processes the whole stream with a single ordered consumer.
    #[serde(default = "default_partitions")]
    pub partitions: u16,
    /// Capacity of the transport queue and of each partition queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Time, in milliseconds, given to partition workers to drain their queues on shutdown
    /// before they are aborted.
    #[serde(default = "default_shutdown_drain_timeout_ms")]
    pub shutdown_drain_timeout_ms: u64,
    /// Number of items, and separately of tags, whose relations and attributes the router
    /// remembers. Least recently used entries are evicted; the router then asks the store.
    #[serde(default = "default_routing_table_capacity")]
    pub routing_table_capacity: usize,
}

impl PipelineConfig {
    pub const DEFAULT_PARTITIONS: u16 = 4;

    pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

    pub const DEFAULT_SHUTDOWN_DRAIN_TIMEOUT_MS: u64 = 10_000;

    pub const DEFAULT_ROUTING_TABLE_CAPACITY: usize = 100_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.partitions == 0 {
            return Err(ValidationError::ZeroValue("pipeline.partitions"));
        }

        if self.queue_capacity == 0 {
            return Err(ValidationError::ZeroValue("pipeline.queue_capacity"));
        }

        if self.routing_table_capacity == 0 {
            return Err(ValidationError::ZeroValue("pipeline.routing_table_capacity"));
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
            queue_capacity: default_queue_capacity(),
            shutdown_drain_timeout_ms: default_shutdown_drain_timeout_ms(),
            routing_table_capacity: default_routing_table_capacity(),
        }
    }
}

fn default_partitions() -> u16 {
    PipelineConfig::DEFAULT_PARTITIONS
}

fn default_queue_capacity() -> usize {
    PipelineConfig::DEFAULT_QUEUE_CAPACITY
}

fn default_shutdown_drain_timeout_ms() -> u64 {
    PipelineConfig::DEFAULT_SHUTDOWN_DRAIN_TIMEOUT_MS
}

fn default_routing_table_capacity() -> usize {
    PipelineConfig::DEFAULT_ROUTING_TABLE_CAPACITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_partitions_are_rejected() {
        let config = PipelineConfig {
            partitions: 0,
            ..PipelineConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroValue("pipeline.partitions"))
        );
    }

    #[test]
    fn zero_routing_table_capacity_is_rejected() {
        let config = PipelineConfig {
            routing_table_capacity: 0,
            ..PipelineConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroValue("pipeline.routing_table_capacity"))
        );
    }
}
