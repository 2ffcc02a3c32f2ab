//! Read-only queries over the owner documents.

pub mod fuzzy;
mod service;

pub use service::QueryService;
