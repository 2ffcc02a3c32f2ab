//! Utilities for testing docsync pipelines and stores.

pub mod faulty_store;
pub mod messages;
pub mod notify;
pub mod notifying_store;
