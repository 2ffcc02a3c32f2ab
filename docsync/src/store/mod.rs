//! Document store port and its implementations.

mod base;
#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;
pub mod memory;

pub use base::DocumentStore;
