//! Transports delivering raw change messages to the pipeline.

mod base;
pub mod channel;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use base::{MessageTx, NotificationTransport};
