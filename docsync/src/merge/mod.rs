//! Merging of normalized entity changes into owner documents.

mod change;
mod engine;

pub use change::{DocumentChange, Target};
pub use engine::{MergeEngine, MergeOutcome};
