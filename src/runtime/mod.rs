//! # Compute Runtime
//!
//! The worker pool that executes per-partition and per-cluster tasks.

pub mod pool;

pub use pool::{CancelToken, WorkerPool};
