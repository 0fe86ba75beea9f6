//! Deduplication stages: ingest, clustering, ranking, removal

pub mod ingest;
pub mod kmeans;
pub mod pipeline;
pub mod rank;
pub mod remove;
pub mod union_find;

pub use ingest::{ingest, IngestStats};
pub use kmeans::{ClusterAssigner, KMeans};
pub use pipeline::{DedupOutcome, SemDedup};
pub use rank::{DuplicateRanker, ThresholdRanker};
pub use remove::{apply_files, RemovalStats};
