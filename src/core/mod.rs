//! Core domain types

pub mod cluster;
pub mod document;
pub mod embedding;
pub mod hash;

pub use cluster::{ClusterAssignment, DuplicateGroup, DuplicateIdSet};
pub use document::{Document, DocumentId};
pub use embedding::Embedding;
pub use hash::{ContentHash, InputManifest, ManifestEntry, RunFingerprint};
