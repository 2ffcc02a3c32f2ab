//! Workers of the pipeline: the router and the per-owner partition workers.

pub mod base;
pub mod partition;
pub mod pool;
pub mod router;
