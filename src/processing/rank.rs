//! Near-duplicate grouping inside a cluster

use crate::config::{DedupConfig, Metric};
use crate::core::embedding::normalize;
use crate::core::{DuplicateGroup, Embedding};
use crate::processing::union_find::UnionFind;

/// Slack on the pruning bound so rounding never drops a qualifying pair
const WINDOW_EPSILON: f64 = 1e-6;

/// Finds duplicate groups among the members of one cluster
pub trait DuplicateRanker: Send + Sync {
	fn rank(&self, cluster_id: u32, members: &[Embedding]) -> Vec<DuplicateGroup>;
}

/// Groups every pair at or above `threshold` into connected components and
/// keeps the lowest id of each component.
///
/// Similarity is not transitive, so `a~b` and `b~c` put `a`, `b` and `c` in
/// one group even when `a` and `c` fall below the threshold.
#[derive(Debug, Clone)]
pub struct ThresholdRanker {
	pub metric: Metric,
	pub threshold: f32,
	/// Larger clusters compare within a centroid-distance window instead of all pairs
	pub pairwise_limit: usize,
}

impl ThresholdRanker {
	pub fn new(metric: Metric, threshold: f32, pairwise_limit: usize) -> Self {
		Self {
			metric,
			threshold,
			pairwise_limit,
		}
	}

	pub fn from_config(config: &DedupConfig) -> Self {
		Self::new(config.metric, config.threshold, config.max_pairwise_cluster_size)
	}

	/// Every qualifying pair `(i, j, similarity)` with `i < j`
	fn all_pairs(&self, members: &[&Embedding]) -> Vec<(usize, usize, f32)> {
		let mut edges = Vec::new();
		for i in 0..members.len() {
			for j in (i + 1)..members.len() {
				let sim = self.metric.similarity(&members[i].vector, &members[j].vector);
				if sim >= self.threshold {
					edges.push((i, j, sim));
				}
			}
		}
		edges
	}

	/// Qualifying pairs found by sorting on distance to the centroid. Two
	/// points whose centroid distances differ by more than the threshold's
	/// distance bound cannot be within that bound of each other, so only
	/// neighbours inside the window are compared. The bound is taken one f32
	/// epsilon below the threshold, since a similarity that rounds up to `T`
	/// in f32 may sit just under it in f64.
	fn windowed_pairs(&self, members: &[&Embedding]) -> Vec<(usize, usize, f32)> {
		let centroid = self.centroid(members);
		let mut keyed: Vec<(f64, usize)> = members
			.iter()
			.enumerate()
			.map(|(i, m)| (self.metric.metric_distance(&m.vector, &centroid), i))
			.collect();
		keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

		let slack = (self.threshold - f32::EPSILON).max(f32::MIN_POSITIVE);
		let bound = self.metric.distance_bound(slack) + WINDOW_EPSILON;
		let mut edges = Vec::new();
		for (a, &(key_a, i)) in keyed.iter().enumerate() {
			for &(key_b, j) in &keyed[a + 1..] {
				if key_b - key_a > bound {
					break;
				}
				let sim = self.metric.similarity(&members[i].vector, &members[j].vector);
				if sim >= self.threshold {
					edges.push((i.min(j), i.max(j), sim));
				}
			}
		}
		edges
	}

	fn centroid(&self, members: &[&Embedding]) -> Vec<f32> {
		let dim = members.first().map_or(0, |m| m.dim());
		let mut sum = vec![0.0f64; dim];
		let mut scratch = vec![0.0f64; dim];
		for member in members {
			for (s, &x) in scratch.iter_mut().zip(&member.vector) {
				*s = f64::from(x);
			}
			if self.metric == Metric::Cosine {
				normalize(&mut scratch);
			}
			for (acc, &x) in sum.iter_mut().zip(&scratch) {
				*acc += x;
			}
		}
		let n = members.len().max(1) as f64;
		sum.into_iter().map(|x| (x / n) as f32).collect()
	}
}

impl DuplicateRanker for ThresholdRanker {
	fn rank(&self, cluster_id: u32, members: &[Embedding]) -> Vec<DuplicateGroup> {
		if members.len() < 2 {
			return Vec::new();
		}

		let mut sorted: Vec<&Embedding> = members.iter().collect();
		sorted.sort_by(|a, b| a.document_id.cmp(&b.document_id));

		let edges = if sorted.len() <= self.pairwise_limit {
			self.all_pairs(&sorted)
		} else {
			self.windowed_pairs(&sorted)
		};

		let mut uf = UnionFind::new(sorted.len());
		for &(i, j, _) in &edges {
			uf.union(i, j);
		}

		let mut min_similarity = vec![f32::INFINITY; sorted.len()];
		for &(i, _, sim) in &edges {
			let root = uf.find(i);
			min_similarity[root] = min_similarity[root].min(sim);
		}

		let mut groups: Vec<DuplicateGroup> = uf
			.components()
			.into_iter()
			.filter_map(|(root, indices)| {
				let ids = indices.iter().map(|&i| sorted[i].document_id.clone()).collect();
				DuplicateGroup::from_members(cluster_id, ids, min_similarity[root])
			})
			.collect();
		groups.sort_by(|a, b| a.keeper.cmp(&b.keeper));
		groups
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::core::DocumentId;

	fn emb(id: &str, v: &[f32]) -> Embedding {
		Embedding::new(id, v.to_vec())
	}

	fn member_ids(group: &DuplicateGroup) -> Vec<&str> {
		group.members.iter().map(DocumentId::as_str).collect()
	}

	#[test]
	fn groups_identical_vectors() {
		let members = vec![
			emb("d3", &[1.0, 0.0]),
			emb("d1", &[1.0, 0.0]),
			emb("d6", &[0.0, 1.0]),
			emb("d2", &[1.0, 0.0]),
		];
		let groups = ThresholdRanker::new(Metric::Cosine, 0.99, 100).rank(4, &members);

		assert_eq!(groups.len(), 1);
		assert_eq!(groups[0].cluster_id, 4);
		assert_eq!(groups[0].keeper.as_str(), "d1");
		assert_eq!(member_ids(&groups[0]), vec!["d1", "d2", "d3"]);
		assert_eq!(groups[0].min_similarity, 1.0);
	}

	#[test]
	fn chains_form_one_component() {
		// a~b and b~c at 0.9, a vs c is ~0.62
		let angle = 0.9f32.acos();
		let members = vec![
			emb("a", &[1.0, 0.0]),
			emb("b", &[angle.cos(), angle.sin()]),
			emb("c", &[(2.0 * angle).cos(), (2.0 * angle).sin()]),
		];
		let ranker = ThresholdRanker::new(Metric::Cosine, 0.899, 100);
		assert!(ranker.metric.similarity(&members[0].vector, &members[2].vector) < 0.899);

		let groups = ranker.rank(0, &members);
		assert_eq!(groups.len(), 1);
		assert_eq!(member_ids(&groups[0]), vec!["a", "b", "c"]);
	}

	#[test]
	fn result_ignores_member_order() {
		let mut members = vec![
			emb("x", &[1.0, 0.1]),
			emb("b", &[1.0, 0.1]),
			emb("q", &[0.0, 1.0]),
			emb("m", &[0.01, 1.0]),
			emb("z", &[-1.0, 0.0]),
		];
		let ranker = ThresholdRanker::new(Metric::Cosine, 0.99, 100);
		let forward = ranker.rank(0, &members);
		members.reverse();
		assert_eq!(ranker.rank(0, &members), forward);
		assert_eq!(forward.len(), 2);
		assert_eq!(forward[0].keeper.as_str(), "b");
		assert_eq!(forward[1].keeper.as_str(), "m");
	}

	#[test]
	fn below_threshold_forms_no_group() {
		let members = vec![emb("a", &[1.0, 0.0]), emb("b", &[0.0, 1.0])];
		assert!(ThresholdRanker::new(Metric::Cosine, 0.5, 100).rank(0, &members).is_empty());
		assert!(ThresholdRanker::new(Metric::Cosine, 0.5, 100).rank(0, &members[..1]).is_empty());
	}

	#[test]
	fn l2_similarity_threshold() {
		let members = vec![emb("a", &[0.0, 0.0]), emb("b", &[0.0, 0.5]), emb("c", &[0.0, 3.0])];
		// 1 / (1 + 0.5) = 0.667, 1 / (1 + 2.5) = 0.286
		let groups = ThresholdRanker::new(Metric::L2, 0.6, 100).rank(0, &members);
		assert_eq!(groups.len(), 1);
		assert_eq!(member_ids(&groups[0]), vec!["a", "b"]);
	}

	#[test]
	fn window_matches_all_pairs() {
		let mut members = Vec::new();
		for i in 0..60 {
			let t = i as f32 * 0.037;
			let v = [t.cos(), t.sin(), ((i % 7) as f32) * 0.01];
			members.push(emb(&format!("p{:02}", i), &v));
			if i % 5 == 0 {
				members.push(emb(&format!("q{:02}", i), &[v[0], v[1], v[2] + 0.001]));
			}
		}

		for metric in [Metric::Cosine, Metric::L2] {
			for threshold in [0.95, 0.99, 0.999, 0.9999, 1.0] {
				let exact = ThresholdRanker::new(metric, threshold, usize::MAX).rank(2, &members);
				let windowed = ThresholdRanker::new(metric, threshold, 0).rank(2, &members);
				assert_eq!(windowed, exact, "{:?} at {}", metric, threshold);
			}
		}
	}

	#[test]
	fn window_keeps_pairs_that_round_to_one() {
		// cos(2e-4) rounds to 1.0 in f32 but acos(1.0) is zero
		let angle = 2e-4f32;
		let members = vec![
			emb("a", &[1.0, 0.0]),
			emb("b", &[angle.cos(), angle.sin()]),
			emb("c", &[0.5f32.cos(), -(0.5f32.sin())]),
		];
		let exact = ThresholdRanker::new(Metric::Cosine, 1.0, usize::MAX).rank(0, &members);
		let windowed = ThresholdRanker::new(Metric::Cosine, 1.0, 0).rank(0, &members);
		assert_eq!(exact.len(), 1);
		assert_eq!(member_ids(&exact[0]), vec!["a", "b"]);
		assert_eq!(windowed, exact);
	}
}
