//! Partitioned embedding store with per-partition checkpoints

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ARTIFACT_EXT, CACHE_FORMAT_VERSION, EMBEDDINGS_DIR, PARTIAL_SUFFIX};
use crate::core::{ContentHash, Embedding, InputManifest};
use crate::error::{DedupError, Result};
use crate::ui;

pub type PartitionId = u32;

const PARTITION_PREFIX: &str = "part-";

/// Store directory for one input manifest read with one pair of field names
pub fn store_root(state_dir: &Path, manifest: &InputManifest, id_field: &str, embedding_field: &str) -> PathBuf {
	let key = ContentHash::of_bytes(
		format!("{}\0{}\0{}", manifest.checksum(), id_field, embedding_field).as_bytes(),
	);
	state_dir.join(EMBEDDINGS_DIR).join(key.as_str())
}

#[derive(Debug, Serialize, Deserialize)]
struct PartitionFile {
	version: u32,
	partition: PartitionId,
	/// Checksum of the input the partition was built from
	source: Option<ContentHash>,
	dim: usize,
	records: Vec<Embedding>,
}

/// Embeddings grouped into partitions. Sealed partitions live on disk and
/// survive restarts; open partitions are buffered until sealed.
pub struct EmbeddingStore {
	root: PathBuf,
	dim: Option<usize>,
	buffers: BTreeMap<PartitionId, Vec<Embedding>>,
}

impl EmbeddingStore {
	/// Open (or create) a store rooted at `root`
	pub fn open(root: &Path) -> Result<Self> {
		fs::create_dir_all(root).map_err(|e| DedupError::storage(root, e))?;
		let mut store = Self {
			root: root.to_path_buf(),
			dim: None,
			buffers: BTreeMap::new(),
		};
		store.dim = store.sealed_dim()?;
		Ok(store)
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Dimensionality shared by every vector, once known
	pub fn dim(&self) -> Option<usize> {
		self.dim
	}

	/// Buffer an embedding in `partition`. Fails on a dimensionality change.
	pub fn append(&mut self, partition: PartitionId, embedding: Embedding) -> Result<()> {
		self.check_dim(&embedding)?;
		self.buffers.entry(partition).or_default().push(embedding);
		Ok(())
	}

	/// Persist a partition atomically. This is the checkpoint: a sealed
	/// partition is skipped on the next ingest of the same source.
	pub fn seal(&mut self, partition: PartitionId, source: Option<&ContentHash>) -> Result<()> {
		let records = self.buffers.remove(&partition).unwrap_or_default();
		let file = PartitionFile {
			version: CACHE_FORMAT_VERSION,
			partition,
			source: source.cloned(),
			dim: self.dim.unwrap_or(0),
			records,
		};

		let bytes = rmp_serde::to_vec(&file)
			.map_err(|e| DedupError::storage(&self.root, std::io::Error::other(e)))?;
		let path = self.partition_path(partition);
		let staging = path.with_extension(format!("{}{}", ARTIFACT_EXT, PARTIAL_SUFFIX));
		fs::write(&staging, bytes).map_err(|e| DedupError::storage(&staging, e))?;
		fs::rename(&staging, &path).map_err(|e| DedupError::storage(&path, e))?;

		ui::debug(&format!(
			"Sealed partition {} ({} embeddings)",
			partition,
			file.records.len()
		));
		Ok(())
	}

	/// True if `partition` is sealed, readable and was built from `source`
	pub fn is_sealed(&self, partition: PartitionId, source: &ContentHash) -> bool {
		match self.read_partition(partition) {
			Ok(Some(file)) => file.source.as_ref() == Some(source),
			Ok(None) => false,
			Err(e) => {
				ui::warn(&format!("{}, re-ingesting", e));
				false
			}
		}
	}

	/// Embeddings of one partition in insertion order. Missing partitions are empty.
	pub fn load(&self, partition: PartitionId) -> Result<Vec<Embedding>> {
		if let Some(buffer) = self.buffers.get(&partition) {
			return Ok(buffer.clone());
		}
		match self.read_partition(partition)? {
			Some(file) => {
				if let (Some(expected), Some(first)) = (self.dim, file.records.first()) {
					if first.dim() != expected {
						return Err(DedupError::DimensionMismatch {
							document_id: first.document_id.clone(),
							expected,
							found: first.dim(),
						});
					}
				}
				Ok(file.records)
			}
			None => Ok(Vec::new()),
		}
	}

	/// Sealed and open partition ids, ascending
	pub fn partitions(&self) -> Result<Vec<PartitionId>> {
		let mut ids: Vec<PartitionId> = self.buffers.keys().copied().collect();
		let entries = fs::read_dir(&self.root).map_err(|e| DedupError::storage(&self.root, e))?;
		for entry in entries.filter_map(|e| e.ok()) {
			if let Some(id) = parse_partition_name(&entry.path()) {
				ids.push(id);
			}
		}
		ids.sort_unstable();
		ids.dedup();
		Ok(ids)
	}

	/// Every embedding: partitions ascending, insertion order within each
	pub fn load_all(&self) -> Result<Vec<Embedding>> {
		let mut all = Vec::new();
		for partition in self.partitions()? {
			all.extend(self.load(partition)?);
		}
		Ok(all)
	}

	/// Drop sealed partitions at or above `first`, left over from a larger input
	pub fn truncate(&mut self, first: PartitionId) -> Result<()> {
		for partition in self.partitions()? {
			if partition >= first {
				self.buffers.remove(&partition);
				let path = self.partition_path(partition);
				if path.exists() {
					fs::remove_file(&path).map_err(|e| DedupError::storage(&path, e))?;
				}
			}
		}
		Ok(())
	}

	/// Forget `partitions` before they are rebuilt. The store dimension is
	/// re-derived from what remains, so rebuilt input may change it.
	pub fn discard(&mut self, partitions: &[PartitionId]) -> Result<()> {
		for &partition in partitions {
			self.buffers.remove(&partition);
			let path = self.partition_path(partition);
			if path.exists() {
				fs::remove_file(&path).map_err(|e| DedupError::storage(&path, e))?;
			}
		}
		let buffered = self.buffers.values().flatten().next().map(Embedding::dim);
		self.dim = match buffered {
			Some(dim) => Some(dim),
			None => self.sealed_dim()?,
		};
		Ok(())
	}

	fn check_dim(&mut self, embedding: &Embedding) -> Result<()> {
		match self.dim {
			Some(expected) if expected != embedding.dim() => Err(DedupError::DimensionMismatch {
				document_id: embedding.document_id.clone(),
				expected,
				found: embedding.dim(),
			}),
			Some(_) => Ok(()),
			None => {
				self.dim = Some(embedding.dim());
				Ok(())
			}
		}
	}

	fn sealed_dim(&self) -> Result<Option<usize>> {
		for partition in self.partitions()? {
			if let Ok(Some(file)) = self.read_partition(partition) {
				if !file.records.is_empty() {
					return Ok(Some(file.dim));
				}
			}
		}
		Ok(None)
	}

	fn read_partition(&self, partition: PartitionId) -> Result<Option<PartitionFile>> {
		let path = self.partition_path(partition);
		if !path.exists() {
			return Ok(None);
		}
		let bytes = fs::read(&path)?;
		let file: PartitionFile =
			rmp_serde::from_slice(&bytes).map_err(|e| DedupError::corrupt(&path, e.to_string()))?;
		if file.version != CACHE_FORMAT_VERSION || file.partition != partition {
			return Err(DedupError::corrupt(&path, "partition header mismatch"));
		}
		Ok(Some(file))
	}

	fn partition_path(&self, partition: PartitionId) -> PathBuf {
		self.root
			.join(format!("{}{:05}.{}", PARTITION_PREFIX, partition, ARTIFACT_EXT))
	}
}

fn parse_partition_name(path: &Path) -> Option<PartitionId> {
	if path.extension().and_then(|s| s.to_str()) != Some(ARTIFACT_EXT) {
		return None;
	}
	path.file_stem()?
		.to_str()?
		.strip_prefix(PARTITION_PREFIX)?
		.parse()
		.ok()
}
