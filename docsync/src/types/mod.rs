//! Common types used throughout docsync.
//!
//! Covers the change envelope read from the transport, the normalized entity changes produced
//! from it, and the nested owner documents kept in the index.

mod document;
mod entity;
mod envelope;

pub use document::*;
pub use entity::*;
pub use envelope::*;
