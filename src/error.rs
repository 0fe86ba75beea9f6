//! Error types for the deduplication engine

use std::path::PathBuf;

use thiserror::Error;

use crate::core::DocumentId;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, DedupError>;

#[derive(Error, Debug)]
pub enum DedupError {
	/// An embedding does not match the dimensionality of the store
	#[error("Dimension mismatch for {document_id}: expected {expected}, found {found}")]
	DimensionMismatch {
		document_id: DocumentId,
		expected: usize,
		found: usize,
	},

	/// Fewer points than requested clusters
	#[error("Cannot form {clusters} clusters from {points} embeddings (lower n_clusters to at most {points})")]
	InsufficientData { points: usize, clusters: usize },

	/// A cache entry failed its integrity check. Never escapes the cache,
	/// which treats it as a miss.
	#[error("Corrupt cache entry at {path}: {reason}")]
	CacheCorrupt { path: PathBuf, reason: String },

	/// Cache or embedding storage cannot be created or written
	#[error("Storage unavailable at {path}: {source}")]
	StorageUnavailable {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Document id {0} appears more than once")]
	DuplicateDocumentId(DocumentId),

	#[error("Invalid config: {0}")]
	InvalidConfig(String),

	/// Malformed input record
	#[error("{}:{line}: {reason}", path.display())]
	InvalidInput {
		path: PathBuf,
		line: usize,
		reason: String,
	},

	#[error("Run cancelled")]
	Cancelled,

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl DedupError {
	pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::StorageUnavailable {
			path: path.into(),
			source,
		}
	}

	pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
		Self::CacheCorrupt {
			path: path.into(),
			reason: reason.into(),
		}
	}
}
