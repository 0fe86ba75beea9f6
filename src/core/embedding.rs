//! Embedding vectors and the similarity metrics over them

use serde::{Deserialize, Serialize};

use crate::config::Metric;
use crate::core::DocumentId;

/// A document's embedding. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
	pub document_id: DocumentId,
	pub vector: Vec<f32>,
}

impl Embedding {
	pub fn new(document_id: impl Into<DocumentId>, vector: Vec<f32>) -> Self {
		Self {
			document_id: document_id.into(),
			vector,
		}
	}

	pub fn dim(&self) -> usize {
		self.vector.len()
	}

	pub fn as_slice(&self) -> &[f32] {
		&self.vector
	}
}

impl Metric {
	/// Distance used by k-means: `1 - cos` for cosine, Euclidean for L2
	pub fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
		match self {
			Metric::Cosine => 1.0 - cosine(a, b),
			Metric::L2 => l2_distance(a, b),
		}
	}

	/// Similarity in [0, 1] compared against the duplicate threshold
	pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
		match self {
			Metric::Cosine => cosine(a, b).clamp(0.0, 1.0) as f32,
			Metric::L2 => (1.0 / (1.0 + l2_distance(a, b))) as f32,
		}
	}

	/// Distance satisfying the triangle inequality, used to prune pair
	/// comparisons: angular distance for cosine, Euclidean for L2.
	pub fn metric_distance(&self, a: &[f32], b: &[f32]) -> f64 {
		match self {
			Metric::Cosine => cosine(a, b).clamp(-1.0, 1.0).acos(),
			Metric::L2 => l2_distance(a, b),
		}
	}

	/// Largest `metric_distance` at which two vectors can still reach `threshold`
	pub fn distance_bound(&self, threshold: f32) -> f64 {
		let t = f64::from(threshold);
		match self {
			Metric::Cosine => t.clamp(-1.0, 1.0).acos(),
			Metric::L2 => 1.0 / t - 1.0,
		}
	}
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
	let mut dot = 0.0f64;
	let mut na = 0.0f64;
	let mut nb = 0.0f64;
	for (&x, &y) in a.iter().zip(b.iter()) {
		let (x, y) = (f64::from(x), f64::from(y));
		dot += x * y;
		na += x * x;
		nb += y * y;
	}
	let denom = na.sqrt() * nb.sqrt();
	if denom > 0.0 {
		dot / denom
	} else {
		0.0
	}
}

fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
	a.iter()
		.zip(b.iter())
		.map(|(&x, &y)| {
			let d = f64::from(x) - f64::from(y);
			d * d
		})
		.sum::<f64>()
		.sqrt()
}

/// L2-normalize in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f64]) {
	let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
	if norm > 0.0 {
		for x in v.iter_mut() {
			*x /= norm;
		}
	}
}
