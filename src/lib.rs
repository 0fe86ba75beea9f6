//! # semdedup
//!
//! Semantic deduplication of document corpora by embedding similarity.
//! Documents are clustered with k-means, near-duplicates are grouped inside
//! each cluster, and all but the lowest id of every group are removed.

pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod processing;
pub mod runtime;
pub mod storage;
pub mod ui;

pub use config::{DedupConfig, Metric};
pub use error::{DedupError, Result};
pub use processing::{DedupOutcome, SemDedup};
