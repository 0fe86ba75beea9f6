//! Cluster assignments and duplicate groups

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::DocumentId;

/// Mapping of every document to exactly one cluster in `[0, K)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
	labels: BTreeMap<DocumentId, u32>,
	centroids: Vec<Vec<f32>>,
	/// Refinement iterations performed
	pub iterations: usize,
}

impl ClusterAssignment {
	pub fn new(labels: BTreeMap<DocumentId, u32>, centroids: Vec<Vec<f32>>, iterations: usize) -> Self {
		Self {
			labels,
			centroids,
			iterations,
		}
	}

	pub fn num_clusters(&self) -> usize {
		self.centroids.len()
	}

	pub fn len(&self) -> usize {
		self.labels.len()
	}

	pub fn is_empty(&self) -> bool {
		self.labels.is_empty()
	}

	pub fn cluster_of(&self, id: &DocumentId) -> Option<u32> {
		self.labels.get(id).copied()
	}

	pub fn centroid(&self, cluster_id: u32) -> Option<&[f32]> {
		self.centroids.get(cluster_id as usize).map(Vec::as_slice)
	}

	/// Labels in document id order
	pub fn labels(&self) -> impl Iterator<Item = (&DocumentId, u32)> {
		self.labels.iter().map(|(id, &c)| (id, c))
	}

	/// Member ids per cluster, each sorted by id
	pub fn members(&self) -> Vec<Vec<DocumentId>> {
		let mut members = vec![Vec::new(); self.num_clusters()];
		for (id, &cluster) in &self.labels {
			if let Some(bucket) = members.get_mut(cluster as usize) {
				bucket.push(id.clone());
			}
		}
		members
	}

	/// The partition as a set of membership sets, independent of cluster labels
	pub fn partition(&self) -> BTreeSet<BTreeSet<DocumentId>> {
		self.members()
			.into_iter()
			.filter(|m| !m.is_empty())
			.map(|m| m.into_iter().collect())
			.collect()
	}

	/// Cluster sizes indexed by cluster id
	pub fn sizes(&self) -> Vec<usize> {
		let mut sizes = vec![0; self.num_clusters()];
		for &cluster in self.labels.values() {
			if let Some(size) = sizes.get_mut(cluster as usize) {
				*size += 1;
			}
		}
		sizes
	}
}

/// A set of near-duplicates inside one cluster with its single keeper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
	pub cluster_id: u32,
	/// Retained representative, the lowest id in the group
	pub keeper: DocumentId,
	/// All members sorted by id, keeper included
	pub members: Vec<DocumentId>,
	/// Lowest similarity among qualifying pairs inside the group
	pub min_similarity: f32,
}

impl DuplicateGroup {
	/// Build a group from unordered members. Returns `None` for singletons.
	pub fn from_members(cluster_id: u32, mut members: Vec<DocumentId>, min_similarity: f32) -> Option<Self> {
		members.sort();
		members.dedup();
		if members.len() < 2 {
			return None;
		}
		Some(Self {
			cluster_id,
			keeper: members[0].clone(),
			members,
			min_similarity,
		})
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	/// Members that get removed: everything except the keeper
	pub fn duplicates(&self) -> impl Iterator<Item = &DocumentId> {
		self.members.iter().filter(move |id| **id != self.keeper)
	}
}

/// Ids of every document marked as a duplicate, in id order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DuplicateIdSet(BTreeSet<DocumentId>);

impl DuplicateIdSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_groups<'a>(groups: impl IntoIterator<Item = &'a DuplicateGroup>) -> Self {
		groups
			.into_iter()
			.flat_map(|g| g.duplicates().cloned())
			.collect()
	}

	pub fn contains(&self, id: &DocumentId) -> bool {
		self.0.contains(id)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &DocumentId> {
		self.0.iter()
	}
}

impl FromIterator<DocumentId> for DuplicateIdSet {
	fn from_iter<I: IntoIterator<Item = DocumentId>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

impl<'a> IntoIterator for &'a DuplicateIdSet {
	type Item = &'a DocumentId;
	type IntoIter = std::collections::btree_set::Iter<'a, DocumentId>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ids(raw: &[&str]) -> Vec<DocumentId> {
		raw.iter().map(|s| DocumentId::from(*s)).collect()
	}

	#[test]
	fn keeper_is_lowest_id() {
		let group = DuplicateGroup::from_members(3, ids(&["d9", "d10", "d2"]), 0.99).unwrap();
		assert_eq!(group.keeper.as_str(), "d10");
		assert_eq!(group.members, ids(&["d10", "d2", "d9"]));
		let dups: Vec<_> = group.duplicates().map(DocumentId::as_str).collect();
		assert_eq!(dups, vec!["d2", "d9"]);
	}

	#[test]
	fn singletons_form_no_group() {
		assert!(DuplicateGroup::from_members(0, ids(&["a"]), 1.0).is_none());
		assert!(DuplicateGroup::from_members(0, ids(&["a", "a"]), 1.0).is_none());
	}

	#[test]
	fn duplicate_set_excludes_keepers() {
		let groups = vec![
			DuplicateGroup::from_members(0, ids(&["d1", "d2", "d3"]), 1.0).unwrap(),
			DuplicateGroup::from_members(1, ids(&["d5", "d4"]), 1.0).unwrap(),
		];
		let set = DuplicateIdSet::from_groups(&groups);
		let listed: Vec<_> = set.iter().map(DocumentId::as_str).collect();
		assert_eq!(listed, vec!["d2", "d3", "d5"]);
		assert!(!set.contains(&"d1".into()));
	}

	#[test]
	fn assignment_members_and_partition() {
		let mut labels = BTreeMap::new();
		labels.insert(DocumentId::from("b"), 1);
		labels.insert(DocumentId::from("a"), 0);
		labels.insert(DocumentId::from("c"), 1);
		let assignment = ClusterAssignment::new(labels, vec![vec![0.0], vec![1.0]], 2);

		assert_eq!(assignment.members(), vec![ids(&["a"]), ids(&["b", "c"])]);
		assert_eq!(assignment.sizes(), vec![1, 2]);
		assert_eq!(assignment.partition().len(), 2);
		assert_eq!(assignment.cluster_of(&"c".into()), Some(1));
	}
}
