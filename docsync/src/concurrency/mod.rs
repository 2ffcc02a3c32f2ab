//! Concurrency primitives shared by the transport, the router and the partition workers.
//!
//! A single shutdown signal, created by the pipeline, is observed by the transport. Every
//! other stage stops when its input queue is closed and drained, so shutting down the
//! transport is enough to drain the whole pipeline in order.

pub mod shutdown;
