//! Disjoint-set forest for grouping near-duplicates

use std::collections::BTreeMap;

/// Union-Find with path halving and union by rank
pub struct UnionFind {
	parent: Vec<usize>,
	rank: Vec<u8>,
}

impl UnionFind {
	pub fn new(n: usize) -> Self {
		Self {
			parent: (0..n).collect(),
			rank: vec![0; n],
		}
	}

	pub fn find(&mut self, mut x: usize) -> usize {
		while self.parent[x] != x {
			self.parent[x] = self.parent[self.parent[x]];
			x = self.parent[x];
		}
		x
	}

	/// Merge the sets of `x` and `y`. Returns false if already joined.
	pub fn union(&mut self, x: usize, y: usize) -> bool {
		let rx = self.find(x);
		let ry = self.find(y);
		if rx == ry {
			return false;
		}

		match self.rank[rx].cmp(&self.rank[ry]) {
			std::cmp::Ordering::Less => self.parent[rx] = ry,
			std::cmp::Ordering::Greater => self.parent[ry] = rx,
			std::cmp::Ordering::Equal => {
				self.parent[ry] = rx;
				self.rank[rx] = self.rank[rx].saturating_add(1);
			}
		}
		true
	}

	/// Sets with more than one element, keyed by root, members ascending
	pub fn components(&mut self) -> BTreeMap<usize, Vec<usize>> {
		let mut sets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
		for i in 0..self.parent.len() {
			let root = self.find(i);
			sets.entry(root).or_default().push(i);
		}
		sets.retain(|_, members| members.len() > 1);
		sets
	}

	pub fn len(&self) -> usize {
		self.parent.len()
	}

	pub fn is_empty(&self) -> bool {
		self.parent.is_empty()
	}
}
