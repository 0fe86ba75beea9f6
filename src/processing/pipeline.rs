//! Identify-then-remove semantic deduplication

use std::collections::HashSet;

use crate::config::DedupConfig;
use crate::core::{ClusterAssignment, Document, DuplicateGroup, DuplicateIdSet, Embedding, InputManifest, RunFingerprint};
use crate::error::{DedupError, Result};
use crate::processing::kmeans::{ClusterAssigner, KMeans};
use crate::processing::rank::{DuplicateRanker, ThresholdRanker};
use crate::processing::remove;
use crate::runtime::WorkerPool;
use crate::storage::cache::{DedupResultCache, RunArtifact};
use crate::storage::embeddings::EmbeddingStore;
use crate::ui;

/// Result of [`SemDedup::identify_duplicates`]
#[derive(Debug, Clone)]
pub struct DedupOutcome {
	pub fingerprint: RunFingerprint,
	pub artifact: RunArtifact,
	/// True when the artifact came from the cache without recomputation
	pub cache_hit: bool,
}

impl DedupOutcome {
	pub fn duplicates(&self) -> &DuplicateIdSet {
		&self.artifact.duplicates
	}

	pub fn groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
		self.artifact.all_groups()
	}

	pub fn total_documents(&self) -> usize {
		self.artifact.assignment.len()
	}

	/// Documents in no group at all
	pub fn unique_documents(&self) -> usize {
		let grouped: usize = self.groups().map(DuplicateGroup::len).sum();
		self.total_documents() - grouped
	}
}

/// The deduplication engine: clustering, then per-cluster ranking, with
/// results cached by fingerprint.
pub struct SemDedup<A = KMeans, R = ThresholdRanker> {
	config: DedupConfig,
	assigner: A,
	ranker: R,
}

impl SemDedup {
	/// Engine with k-means clustering and threshold ranking from `config`
	pub fn from_config(config: DedupConfig) -> Result<Self> {
		let assigner = KMeans::from_config(&config);
		let ranker = ThresholdRanker::from_config(&config);
		Self::new(config, assigner, ranker)
	}
}

impl<A: ClusterAssigner, R: DuplicateRanker> SemDedup<A, R> {
	pub fn new(config: DedupConfig, assigner: A, ranker: R) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			config,
			assigner,
			ranker,
		})
	}

	pub fn config(&self) -> &DedupConfig {
		&self.config
	}

	/// Find duplicates among every embedding in `store`. A valid cache entry
	/// for the run fingerprint is returned as is; otherwise the result is
	/// computed and cached. Nothing is cached if the run is cancelled.
	pub fn identify_duplicates(
		&self,
		store: &EmbeddingStore,
		manifest: &InputManifest,
		cache: &DedupResultCache,
		pool: &WorkerPool,
	) -> Result<DedupOutcome> {
		let fingerprint = RunFingerprint::run(&self.config, manifest);
		ui::debug(&format!("Run fingerprint: {}", fingerprint));

		if let Some(artifact) = cache.get(&fingerprint)? {
			ui::success(&format!("Using cached results ({})", fingerprint.short()));
			return Ok(DedupOutcome {
				fingerprint,
				artifact,
				cache_hit: true,
			});
		}

		let cancel = pool.cancel_token();
		cancel.check()?;

		let embeddings = store.load_all()?;
		ensure_unique_ids(&embeddings)?;
		ui::info(&format!(
			"Loaded {} embeddings ({}D)",
			embeddings.len(),
			store.dim().unwrap_or(0)
		));

		let assignment = self.cluster(&embeddings, manifest, cache, pool)?;
		cancel.check()?;

		let mut buckets: Vec<(u32, Vec<Embedding>)> =
			(0..assignment.num_clusters() as u32).map(|c| (c, Vec::new())).collect();
		for embedding in embeddings {
			if let Some(cluster) = assignment.cluster_of(&embedding.document_id) {
				buckets[cluster as usize].1.push(embedding);
			}
		}

		ui::info(&format!(
			"Ranking {} clusters (threshold {})",
			buckets.len(),
			self.config.threshold
		));
		let groups = pool.map(&buckets, |(cluster, members)| Ok(self.ranker.rank(*cluster, members)))?;

		let duplicates = DuplicateIdSet::from_groups(groups.iter().flatten());
		let artifact = RunArtifact {
			assignment,
			groups,
			duplicates,
		};

		cancel.check()?;
		cache.put(&fingerprint, &artifact)?;

		Ok(DedupOutcome {
			fingerprint,
			artifact,
			cache_hit: false,
		})
	}

	/// Drop `duplicates` from `dataset`
	pub fn remove(&self, dataset: &[Document], duplicates: &DuplicateIdSet) -> Vec<Document> {
		remove::apply(dataset, duplicates)
	}

	/// Cached clustering when one covers every embedding, else a fresh one
	fn cluster(
		&self,
		embeddings: &[Embedding],
		manifest: &InputManifest,
		cache: &DedupResultCache,
		pool: &WorkerPool,
	) -> Result<ClusterAssignment> {
		let fingerprint = RunFingerprint::clustering(&self.config, manifest);

		if let Some(assignment) = cache.get_assignment(&fingerprint)? {
			let covers = assignment.len() == embeddings.len()
				&& embeddings.iter().all(|e| assignment.cluster_of(&e.document_id).is_some());
			if covers {
				ui::success(&format!("Using cached clustering ({})", fingerprint.short()));
				return Ok(assignment);
			}
			ui::warn("Cached clustering does not match the embeddings, reclustering");
		}

		ui::info(&format!(
			"Clustering {} embeddings into {} clusters",
			embeddings.len(),
			self.config.n_clusters
		));
		let assignment =
			pool.install(|| self.assigner.assign(embeddings, self.config.n_clusters, self.config.seed))?;

		let sizes = assignment.sizes();
		ui::debug(&format!(
			"Cluster sizes: min={}, max={}, iterations={}",
			sizes.iter().min().unwrap_or(&0),
			sizes.iter().max().unwrap_or(&0),
			assignment.iterations
		));

		pool.cancel_token().check()?;
		cache.put_assignment(&fingerprint, &assignment)?;
		Ok(assignment)
	}
}

fn ensure_unique_ids(embeddings: &[Embedding]) -> Result<()> {
	let mut seen = HashSet::with_capacity(embeddings.len());
	for embedding in embeddings {
		if !seen.insert(&embedding.document_id) {
			return Err(DedupError::DuplicateDocumentId(embedding.document_id.clone()));
		}
	}
	Ok(())
}
