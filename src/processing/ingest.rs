//! Loading embedding files into the store, one partition per file

use crate::core::{ContentHash, InputManifest, ManifestEntry};
use crate::error::Result;
use crate::runtime::WorkerPool;
use crate::storage::dataset;
use crate::storage::embeddings::{EmbeddingStore, PartitionId};
use crate::ui;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
	/// Partitions read from input on this run
	pub ingested: usize,
	/// Partitions already sealed from an earlier run
	pub skipped: usize,
	pub embeddings: usize,
}

/// Ingest every manifest entry not already sealed in the store. Files are
/// parsed in parallel a batch at a time; each batch is appended and sealed in
/// partition order before the next starts, so an interrupted run resumes
/// from the last sealed partition.
pub fn ingest(
	store: &mut EmbeddingStore,
	manifest: &InputManifest,
	id_field: &str,
	embedding_field: &str,
	pool: &WorkerPool,
) -> Result<IngestStats> {
	let mut stats = IngestStats::default();
	let mut pending = Vec::new();

	for (index, entry) in manifest.entries().iter().enumerate() {
		let partition = index as PartitionId;
		let source = partition_source(entry, id_field, embedding_field);
		if store.is_sealed(partition, &source) {
			stats.skipped += 1;
		} else {
			pending.push((partition, entry, source));
		}
	}

	if stats.skipped > 0 {
		ui::info(&format!("Resuming: {} partitions already ingested", stats.skipped));
	}
	let stale: Vec<PartitionId> = pending.iter().map(|(partition, _, _)| *partition).collect();
	store.discard(&stale)?;

	for batch in pending.chunks(pool.threads().max(1)) {
		let parsed = pool.map(batch, |(_, entry, _)| {
			dataset::read_embeddings(&manifest.path_of(entry), id_field, embedding_field)
		})?;

		for ((partition, entry, source), embeddings) in batch.iter().zip(parsed) {
			stats.embeddings += embeddings.len();
			for embedding in embeddings {
				store.append(*partition, embedding)?;
			}
			store.seal(*partition, Some(source))?;
			stats.ingested += 1;
			ui::debug(&format!("Ingested {} as partition {}", entry.path, partition));
		}
	}

	store.truncate(manifest.len() as PartitionId)?;
	Ok(stats)
}

/// Checksum a sealed partition is tied to: the file content and the fields read from it
fn partition_source(entry: &ManifestEntry, id_field: &str, embedding_field: &str) -> ContentHash {
	ContentHash::of_bytes(format!("{}\0{}\0{}", entry.hash, id_field, embedding_field).as_bytes())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::DedupError;
	use std::fs;
	use tempfile::TempDir;

	fn write_inputs(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
		let a = dir.join("a.jsonl");
		let b = dir.join("b.jsonl");
		fs::write(&a, "{\"id\":\"d1\",\"embedding\":[1,0]}\n{\"id\":\"d2\",\"embedding\":[0,1]}\n").unwrap();
		fs::write(&b, "{\"id\":\"d3\",\"embedding\":[1,1]}\n").unwrap();
		vec![a, b]
	}

	#[test]
	fn ingests_then_resumes() {
		let input = TempDir::new().unwrap();
		let state = TempDir::new().unwrap();
		let files = write_inputs(input.path());
		let manifest = InputManifest::build(input.path(), &files).unwrap();
		let pool = WorkerPool::new(Some(2)).unwrap();

		let mut store = EmbeddingStore::open(state.path()).unwrap();
		let first = ingest(&mut store, &manifest, "id", "embedding", &pool).unwrap();
		assert_eq!(first, IngestStats { ingested: 2, skipped: 0, embeddings: 3 });

		let mut reopened = EmbeddingStore::open(state.path()).unwrap();
		let second = ingest(&mut reopened, &manifest, "id", "embedding", &pool).unwrap();
		assert_eq!(second, IngestStats { ingested: 0, skipped: 2, embeddings: 0 });

		let ids: Vec<String> = reopened.load_all().unwrap().into_iter().map(|e| e.document_id.to_string()).collect();
		assert_eq!(ids, vec!["d1", "d2", "d3"]);
	}

	#[test]
	fn changed_file_is_reingested() {
		let input = TempDir::new().unwrap();
		let state = TempDir::new().unwrap();
		let files = write_inputs(input.path());
		let pool = WorkerPool::new(Some(2)).unwrap();
		let mut store = EmbeddingStore::open(state.path()).unwrap();
		ingest(&mut store, &InputManifest::build(input.path(), &files).unwrap(), "id", "embedding", &pool).unwrap();

		fs::write(&files[1], "{\"id\":\"d4\",\"embedding\":[2,2]}\n").unwrap();
		let manifest = InputManifest::build(input.path(), &files).unwrap();
		let stats = ingest(&mut store, &manifest, "id", "embedding", &pool).unwrap();
		assert_eq!(stats.ingested, 1);
		assert_eq!(stats.skipped, 1);
		assert_eq!(store.load(1).unwrap()[0].document_id.as_str(), "d4");
	}

	#[test]
	fn reembedded_file_may_change_dimension() {
		let input = TempDir::new().unwrap();
		let state = TempDir::new().unwrap();
		let file = input.path().join("a.jsonl");
		fs::write(&file, "{\"id\":\"d1\",\"embedding\":[1,0,0]}\n").unwrap();
		let pool = WorkerPool::new(Some(1)).unwrap();
		let mut store = EmbeddingStore::open(state.path()).unwrap();
		ingest(&mut store, &InputManifest::build(input.path(), &[file.clone()]).unwrap(), "id", "embedding", &pool).unwrap();

		fs::write(&file, "{\"id\":\"d1\",\"embedding\":[1,0]}\n").unwrap();
		let mut reopened = EmbeddingStore::open(state.path()).unwrap();
		let manifest = InputManifest::build(input.path(), &[file]).unwrap();
		let stats = ingest(&mut reopened, &manifest, "id", "embedding", &pool).unwrap();
		assert_eq!(stats.ingested, 1);
		assert_eq!(reopened.dim(), Some(2));
	}

	#[test]
	fn other_embedding_field_is_reingested() {
		let input = TempDir::new().unwrap();
		let state = TempDir::new().unwrap();
		let file = input.path().join("a.jsonl");
		fs::write(&file, "{\"id\":\"d1\",\"a\":[1,0],\"b\":[0,1]}\n").unwrap();
		let manifest = InputManifest::build(input.path(), &[file]).unwrap();
		let pool = WorkerPool::new(Some(1)).unwrap();
		let mut store = EmbeddingStore::open(state.path()).unwrap();

		ingest(&mut store, &manifest, "id", "a", &pool).unwrap();
		let stats = ingest(&mut store, &manifest, "id", "b", &pool).unwrap();
		assert_eq!(stats.ingested, 1);
		assert_eq!(store.load(0).unwrap()[0].vector, vec![0.0, 1.0]);
	}

	#[test]
	fn corrupt_partition_is_rebuilt() {
		let input = TempDir::new().unwrap();
		let state = TempDir::new().unwrap();
		let files = write_inputs(input.path());
		let manifest = InputManifest::build(input.path(), &files).unwrap();
		let pool = WorkerPool::new(Some(2)).unwrap();
		let mut store = EmbeddingStore::open(state.path()).unwrap();
		ingest(&mut store, &manifest, "id", "embedding", &pool).unwrap();

		fs::write(state.path().join("part-00001.msgpack"), b"garbage").unwrap();
		let mut reopened = EmbeddingStore::open(state.path()).unwrap();
		let stats = ingest(&mut reopened, &manifest, "id", "embedding", &pool).unwrap();
		assert_eq!(stats, IngestStats { ingested: 1, skipped: 1, embeddings: 1 });
		assert_eq!(reopened.load(1).unwrap()[0].document_id.as_str(), "d3");
	}

	#[test]
	fn mixed_dimensions_fail() {
		let input = TempDir::new().unwrap();
		let state = TempDir::new().unwrap();
		let file = input.path().join("a.jsonl");
		fs::write(&file, "{\"id\":\"d1\",\"embedding\":[1,0]}\n{\"id\":\"d2\",\"embedding\":[0,1,2]}\n").unwrap();
		let manifest = InputManifest::build(input.path(), &[file]).unwrap();
		let pool = WorkerPool::new(Some(1)).unwrap();
		let mut store = EmbeddingStore::open(state.path()).unwrap();

		assert!(matches!(
			ingest(&mut store, &manifest, "id", "embedding", &pool),
			Err(DedupError::DimensionMismatch { expected: 2, found: 3, .. })
		));
	}
}
