//! On-disk state: input datasets, embedding partitions and cached results

pub mod cache;
pub mod dataset;
pub mod embeddings;

pub use cache::{CleanStats, DedupResultCache, RunArtifact};
pub use embeddings::{store_root, EmbeddingStore, PartitionId};
