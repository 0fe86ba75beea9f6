//! Deterministic k-means partitioning of the embedding space

use std::collections::BTreeMap;

use rayon::prelude::*;
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::config::{DedupConfig, Metric};
use crate::core::embedding::normalize;
use crate::core::{ClusterAssignment, Embedding};
use crate::error::{DedupError, Result};
use crate::ui;

/// Partitions embeddings into `k` clusters
pub trait ClusterAssigner: Send + Sync {
	fn assign(&self, embeddings: &[Embedding], k: usize, seed: u64) -> Result<ClusterAssignment>;
}

/// Lloyd's k-means with farthest-first seeding.
///
/// Input is sorted by document id before anything else, so the result depends
/// only on the set of embeddings, the seed, the metric and the iteration cap.
/// The nearest-centroid step runs in parallel; the centroid update is a
/// sequential reduction in id order.
#[derive(Debug, Clone)]
pub struct KMeans {
	pub metric: Metric,
	pub max_iter: usize,
}

impl KMeans {
	pub fn new(metric: Metric, max_iter: usize) -> Self {
		Self { metric, max_iter }
	}

	pub fn from_config(config: &DedupConfig) -> Self {
		Self::new(config.metric, config.max_iter)
	}

	/// First centroid: lowest seeded hash of the id. Each further centroid:
	/// the point farthest from every centroid chosen so far.
	fn initial_centroids(&self, points: &[&Embedding], k: usize, seed: u64) -> Vec<Vec<f32>> {
		let first = points
			.iter()
			.enumerate()
			.min_by_key(|(i, p)| (xxh3_64_with_seed(p.document_id.as_bytes(), seed), *i))
			.map(|(i, _)| i)
			.unwrap_or(0);

		let mut centroids = vec![points[first].vector.clone()];
		let mut nearest: Vec<f64> = points
			.par_iter()
			.map(|p| self.metric.distance(&p.vector, &centroids[0]))
			.collect();

		while centroids.len() < k {
			let next = farthest(&nearest, |_| true).unwrap_or(0);
			let centroid = points[next].vector.clone();
			nearest
				.par_iter_mut()
				.zip(points.par_iter())
				.for_each(|(d, p)| *d = d.min(self.metric.distance(&p.vector, &centroid)));
			centroids.push(centroid);
		}
		centroids
	}

	/// Label of the nearest centroid (lowest index on ties) and its distance
	fn nearest_centroids(&self, points: &[&Embedding], centroids: &[Vec<f32>]) -> Vec<(usize, f64)> {
		points
			.par_iter()
			.map(|p| {
				let mut best = (0, f64::INFINITY);
				for (c, centroid) in centroids.iter().enumerate() {
					let d = self.metric.distance(&p.vector, centroid);
					if d < best.1 {
						best = (c, d);
					}
				}
				best
			})
			.collect()
	}

	/// Move the farthest point of a shared cluster into each empty cluster
	fn reseed_empty(&self, labels: &mut [usize], distances: &mut [f64], k: usize) -> usize {
		let mut counts = vec![0usize; k];
		for &label in labels.iter() {
			counts[label] += 1;
		}

		let mut reseeded = 0;
		for cluster in 0..k {
			if counts[cluster] > 0 {
				continue;
			}
			let Some(donor) = farthest(distances, |i| counts[labels[i]] > 1) else {
				break;
			};
			counts[labels[donor]] -= 1;
			counts[cluster] = 1;
			labels[donor] = cluster;
			// Pinned: a reseeded point cannot be taken again this round
			distances[donor] = f64::NEG_INFINITY;
			reseeded += 1;
		}
		reseeded
	}

	/// Mean of each cluster, accumulated in id order. Cosine centroids are
	/// the normalized mean of the normalized members.
	fn update_centroids(&self, points: &[&Embedding], labels: &[usize], k: usize, dim: usize) -> Vec<Vec<f32>> {
		let mut sums = vec![vec![0.0f64; dim]; k];
		let mut counts = vec![0usize; k];
		let mut scratch = vec![0.0f64; dim];

		for (point, &label) in points.iter().zip(labels) {
			for (s, &x) in scratch.iter_mut().zip(&point.vector) {
				*s = f64::from(x);
			}
			if self.metric == Metric::Cosine {
				normalize(&mut scratch);
			}
			for (acc, &x) in sums[label].iter_mut().zip(&scratch) {
				*acc += x;
			}
			counts[label] += 1;
		}

		sums.into_iter()
			.zip(counts)
			.map(|(mut sum, count)| {
				if count > 0 {
					for x in sum.iter_mut() {
						*x /= count as f64;
					}
				}
				if self.metric == Metric::Cosine {
					normalize(&mut sum);
				}
				sum.into_iter().map(|x| x as f32).collect()
			})
			.collect()
	}
}

impl ClusterAssigner for KMeans {
	fn assign(&self, embeddings: &[Embedding], k: usize, seed: u64) -> Result<ClusterAssignment> {
		if k == 0 {
			return Err(DedupError::InvalidConfig("n_clusters must be at least 1".into()));
		}
		if embeddings.len() < k {
			return Err(DedupError::InsufficientData {
				points: embeddings.len(),
				clusters: k,
			});
		}

		let mut points: Vec<&Embedding> = embeddings.iter().collect();
		points.sort_by(|a, b| a.document_id.cmp(&b.document_id));

		let dim = points[0].dim();
		for pair in points.windows(2) {
			if pair[0].document_id == pair[1].document_id {
				return Err(DedupError::DuplicateDocumentId(pair[1].document_id.clone()));
			}
		}
		if let Some(bad) = points.iter().find(|p| p.dim() != dim) {
			return Err(DedupError::DimensionMismatch {
				document_id: bad.document_id.clone(),
				expected: dim,
				found: bad.dim(),
			});
		}

		ui::debug(&format!(
			"k-means: {} points, k={}, metric={}, seed={}",
			points.len(),
			k,
			self.metric,
			seed
		));

		let mut centroids = self.initial_centroids(&points, k, seed);
		let mut labels: Vec<usize> = Vec::new();
		let mut iterations = 0;

		while iterations < self.max_iter {
			iterations += 1;

			let (mut next, mut distances): (Vec<usize>, Vec<f64>) =
				self.nearest_centroids(&points, &centroids).into_iter().unzip();
			let reseeded = self.reseed_empty(&mut next, &mut distances, k);
			if reseeded > 0 {
				ui::debug(&format!("k-means iteration {}: re-seeded {} empty clusters", iterations, reseeded));
			}

			let converged = next == labels;
			labels = next;
			centroids = self.update_centroids(&points, &labels, k, dim);
			if converged {
				break;
			}
		}

		ui::debug(&format!("k-means finished after {} iterations", iterations));

		let labels: BTreeMap<_, _> = points
			.iter()
			.zip(&labels)
			.map(|(p, &label)| (p.document_id.clone(), label as u32))
			.collect();
		Ok(ClusterAssignment::new(labels, centroids, iterations))
	}
}

/// Index of the largest value among eligible indices, lowest index on ties
fn farthest(values: &[f64], eligible: impl Fn(usize) -> bool) -> Option<usize> {
	let mut best: Option<(usize, f64)> = None;
	for (i, &v) in values.iter().enumerate() {
		if !eligible(i) {
			continue;
		}
		match best {
			Some((_, b)) if v <= b => {}
			_ => best = Some((i, v)),
		}
	}
	best.map(|(i, _)| i)
}
