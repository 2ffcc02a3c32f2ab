//! Mirrors a relational change feed of owners, items and tags into one nested search document
//! per owner.
//!
//! Raw change messages are read from a [`transport`], decoded and projected by
//! [`conversions`] into normalized [`types::EntityChange`]s, and merged by the [`merge`] engine
//! into the documents of a [`store`]. The [`pipeline`] supervises the whole flow, partitioning
//! the work by owner so that every document sees its changes in order. The [`query`] service
//! reads the documents back.

pub mod concurrency;
pub mod conversions;
pub mod error;
mod macros;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod query;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transport;
pub mod types;
pub mod workers;
