//! Configuration structures shared between the replicator and the query api.

mod api;
mod base;
mod connection;
mod index;
mod pipeline;
mod replicator;
mod source;

pub use api::{ApiConfig, ApplicationSettings};
pub use base::ValidationError;
pub use connection::{PgConnectionConfig, TlsConfig};
pub use index::IndexConfig;
pub use pipeline::PipelineConfig;
pub use replicator::ReplicatorConfig;
pub use source::SourceConfig;
