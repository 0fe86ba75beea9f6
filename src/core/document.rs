//! Documents and their stable identifiers

use serde::{Deserialize, Serialize};

/// Opaque, stable document identifier. Ordered lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn as_bytes(&self) -> &[u8] {
		self.0.as_bytes()
	}
}

impl From<&str> for DocumentId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl From<String> for DocumentId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl std::fmt::Display for DocumentId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// A dataset record. The payload is the raw input line and is never touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
	pub id: DocumentId,
	pub payload: String,
}

impl Document {
	pub fn new(id: impl Into<DocumentId>, payload: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			payload: payload.into(),
		}
	}
}
