//! Application configuration and constants

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{DedupError, Result};

// === Cache Layout ===
pub const CACHE_SUBDIR: &str = "semdedup";
pub const RUNS_DIR: &str = "runs";
pub const CLUSTERING_DIR: &str = "clustering";
pub const EMBEDDINGS_DIR: &str = "embeddings";
pub const GROUPS_DIR: &str = "groups";
pub const ASSIGNMENT_FILE: &str = "assignment.msgpack";
pub const DUPLICATES_FILE: &str = "duplicates.msgpack";
pub const MARKER_FILE: &str = "COMPLETE";
pub const PARTIAL_SUFFIX: &str = ".partial";
pub const ARTIFACT_EXT: &str = "msgpack";
pub const LOG_FILE: &str = "semdedup.log";

// === Input/Output ===
pub const INPUT_EXTENSIONS: &[&str] = &["jsonl", "json"];
pub const DUPLICATES_OUTPUT: &str = "duplicates.jsonl";
pub const FILTERED_DIR: &str = "filtered";

// === Format Versions ===
/// Bumped whenever cached artifacts change shape, invalidating old entries.
pub const CACHE_FORMAT_VERSION: u32 = 1;

// === Defaults ===
pub const DEFAULT_CACHE_DIR: &str = "semdedup_cache";
pub const DEFAULT_ID_FIELD: &str = "id";
pub const DEFAULT_EMBEDDING_FIELD: &str = "embedding";
pub const DEFAULT_N_CLUSTERS: usize = 1000;
pub const DEFAULT_SEED: u64 = 1234;
pub const DEFAULT_MAX_ITER: usize = 100;
pub const DEFAULT_THRESHOLD: f32 = 0.99;
pub const DEFAULT_MAX_PAIRWISE: usize = 20_000;

/// Distance metric used for clustering and similarity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
	/// Cosine similarity (angle between vectors)
	#[default]
	Cosine,
	/// Euclidean distance, similarity = 1 / (1 + d)
	L2,
}

impl Metric {
	pub fn as_str(&self) -> &'static str {
		match self {
			Metric::Cosine => "cosine",
			Metric::L2 => "l2",
		}
	}
}

impl std::fmt::Display for Metric {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Immutable run configuration, passed explicitly to every component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DedupConfig {
	/// Root for embeddings, cached artifacts and the log file
	pub cache_dir: PathBuf,
	/// Only process the first N input files (sorted by path); zero or negative means all
	pub num_files: Option<i64>,
	pub id_field: String,
	pub embedding_field: String,
	/// Number of k-means clusters (K)
	pub n_clusters: usize,
	pub seed: u64,
	/// Iteration cap for k-means
	pub max_iter: usize,
	pub metric: Metric,
	/// Similarity at or above which two documents are near-duplicates
	pub threshold: f32,
	/// Clusters above this size use the centroid-distance window instead of all pairs
	pub max_pairwise_cluster_size: usize,
	/// Worker threads, defaults to the number of cores
	pub threads: Option<usize>,
}

impl Default for DedupConfig {
	fn default() -> Self {
		Self {
			cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
			num_files: None,
			id_field: DEFAULT_ID_FIELD.to_string(),
			embedding_field: DEFAULT_EMBEDDING_FIELD.to_string(),
			n_clusters: DEFAULT_N_CLUSTERS,
			seed: DEFAULT_SEED,
			max_iter: DEFAULT_MAX_ITER,
			metric: Metric::default(),
			threshold: DEFAULT_THRESHOLD,
			max_pairwise_cluster_size: DEFAULT_MAX_PAIRWISE,
			threads: None,
		}
	}
}

impl DedupConfig {
	/// Load and validate a YAML config file
	pub fn from_yaml(path: &Path) -> Result<Self> {
		let text = fs::read_to_string(path)?;
		let config: Self = serde_yaml::from_str(&text)
			.map_err(|e| DedupError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.n_clusters == 0 {
			return Err(DedupError::InvalidConfig("n_clusters must be at least 1".into()));
		}
		if self.max_iter == 0 {
			return Err(DedupError::InvalidConfig("max_iter must be at least 1".into()));
		}
		if !(self.threshold > 0.0 && self.threshold <= 1.0) {
			return Err(DedupError::InvalidConfig(format!(
				"threshold must be in (0, 1], got {}",
				self.threshold
			)));
		}
		if self.id_field.is_empty() || self.embedding_field.is_empty() {
			return Err(DedupError::InvalidConfig("field names must not be empty".into()));
		}
		if self.threads == Some(0) {
			return Err(DedupError::InvalidConfig("threads must be at least 1".into()));
		}
		Ok(())
	}

	/// Input file cap for discovery, `None` when every file is used
	pub fn file_limit(&self) -> Option<usize> {
		self.num_files.filter(|&n| n > 0).map(|n| n as usize)
	}

	/// Root of all engine state inside the cache directory
	pub fn state_dir(&self) -> PathBuf {
		self.cache_dir.join(CACHE_SUBDIR)
	}

	pub fn log_path(&self) -> PathBuf {
		self.cache_dir.join(LOG_FILE)
	}
}
