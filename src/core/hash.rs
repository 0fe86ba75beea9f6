//! Content hashing, input manifests and run fingerprints

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::{xxh3_128, xxh3_64, Xxh3};

use crate::config::{DedupConfig, CACHE_FORMAT_VERSION};

const HASH_BUFFER_SIZE: usize = 65536; // 64KB

/// xxh3 hash of some content, rendered as 16 hex chars
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
	pub fn of_bytes(bytes: &[u8]) -> Self {
		Self(format!("{:016x}", xxh3_64(bytes)))
	}

	/// Hash a whole file, streamed in 64KB chunks
	pub fn of_file(path: &Path) -> std::io::Result<Self> {
		let mut file = File::open(path)?;
		let mut hasher = Xxh3::new();
		let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
		loop {
			let n = file.read(&mut buffer)?;
			if n == 0 {
				break;
			}
			hasher.update(&buffer[..n]);
		}
		Ok(Self(format!("{:016x}", hasher.digest())))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn short(&self) -> &str {
		&self.0[..8.min(self.0.len())]
	}
}

impl std::fmt::Display for ContentHash {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
	/// Path relative to the input root, `/`-separated
	pub path: String,
	pub len: u64,
	pub hash: ContentHash,
}

/// The set of input files a run consumed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputManifest {
	root: PathBuf,
	entries: Vec<ManifestEntry>,
}

impl InputManifest {
	/// Hash every file. Entries are sorted by relative path.
	pub fn build(root: &Path, files: &[PathBuf]) -> std::io::Result<Self> {
		let mut entries = Vec::with_capacity(files.len());
		for file in files {
			let relative = file.strip_prefix(root).unwrap_or(file.as_path());
			let path = relative
				.components()
				.map(|c| c.as_os_str().to_string_lossy())
				.collect::<Vec<_>>()
				.join("/");
			entries.push(ManifestEntry {
				path,
				len: std::fs::metadata(file)?.len(),
				hash: ContentHash::of_file(file)?,
			});
		}
		entries.sort_by(|a, b| a.path.cmp(&b.path));
		Ok(Self {
			root: root.to_path_buf(),
			entries,
		})
	}

	pub fn entries(&self) -> &[ManifestEntry] {
		&self.entries
	}

	/// Absolute path of an entry
	pub fn path_of(&self, entry: &ManifestEntry) -> PathBuf {
		self.root.join(&entry.path)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Checksum over paths, sizes and content hashes, not the root location
	pub fn checksum(&self) -> ContentHash {
		let mut hasher = Xxh3::new();
		for entry in &self.entries {
			hasher.update(entry.path.as_bytes());
			hasher.update(&[0]);
			hasher.update(&entry.len.to_le_bytes());
			hasher.update(entry.hash.as_str().as_bytes());
		}
		ContentHash(format!("{:016x}", hasher.digest()))
	}
}

/// Every input that shapes the cluster assignment
#[derive(Serialize)]
struct ClusteringInputs<'a> {
	format: u32,
	kind: &'static str,
	n_clusters: usize,
	seed: u64,
	max_iter: usize,
	metric: &'static str,
	manifest: &'a str,
	id_field: &'a str,
	embedding_field: &'a str,
}

/// Every input that shapes the duplicate groups
#[derive(Serialize)]
struct RunInputs<'a> {
	clustering: ClusteringInputs<'a>,
	threshold_bits: u32,
	max_pairwise_cluster_size: usize,
}

/// Deterministic cache key, 32 hex chars of xxh3-128
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunFingerprint(String);

impl RunFingerprint {
	/// Fingerprint of a full run: clustering inputs plus threshold settings
	pub fn run(config: &DedupConfig, manifest: &InputManifest) -> Self {
		let checksum = manifest.checksum();
		let inputs = RunInputs {
			clustering: clustering_inputs(config, &checksum, "run"),
			threshold_bits: config.threshold.to_bits(),
			max_pairwise_cluster_size: config.max_pairwise_cluster_size,
		};
		Self::digest(&inputs)
	}

	/// Fingerprint of the clustering step alone
	pub fn clustering(config: &DedupConfig, manifest: &InputManifest) -> Self {
		let checksum = manifest.checksum();
		Self::digest(&clustering_inputs(config, &checksum, "clustering"))
	}

	fn digest<T: Serialize>(inputs: &T) -> Self {
		// Serializing a struct of plain fields cannot fail
		let bytes = serde_json::to_vec(inputs).unwrap_or_default();
		Self(format!("{:032x}", xxh3_128(&bytes)))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn short(&self) -> &str {
		&self.0[..12.min(self.0.len())]
	}
}

fn clustering_inputs<'a>(config: &'a DedupConfig, checksum: &'a ContentHash, kind: &'static str) -> ClusteringInputs<'a> {
	ClusteringInputs {
		format: CACHE_FORMAT_VERSION,
		kind,
		n_clusters: config.n_clusters,
		seed: config.seed,
		max_iter: config.max_iter,
		metric: config.metric.as_str(),
		manifest: checksum.as_str(),
		id_field: &config.id_field,
		embedding_field: &config.embedding_field,
	}
}

impl std::fmt::Display for RunFingerprint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}
