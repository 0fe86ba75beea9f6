//! Identify command - find near-duplicates and write their ids

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use colored::*;

use crate::config::{DedupConfig, DUPLICATES_OUTPUT};
use crate::core::{InputManifest, RunFingerprint};
use crate::processing::{ingest, DedupOutcome, SemDedup};
use crate::runtime::WorkerPool;
use crate::storage::{dataset, store_root, DedupResultCache, EmbeddingStore};
use crate::ui;

pub fn run(
	embeddings: &Path,
	output: Option<&Path>,
	force: bool,
	config: &DedupConfig,
	pool: &WorkerPool,
) -> Result<DedupOutcome> {
	let outcome = identify(embeddings, force, config, pool)?;

	let output = output
		.map(Path::to_path_buf)
		.unwrap_or_else(|| config.cache_dir.join(DUPLICATES_OUTPUT));
	dataset::write_duplicates(&output, outcome.duplicates(), &config.id_field)
		.with_context(|| format!("Failed to write {}", output.display()))?;
	ui::success(&format!(
		"Wrote {} duplicate ids to {}",
		outcome.duplicates().len(),
		ui::path_link(&output, 50)
	));
	Ok(outcome)
}

/// Ingest embeddings from `embeddings` and run the engine over them
pub(crate) fn identify(embeddings: &Path, force: bool, config: &DedupConfig, pool: &WorkerPool) -> Result<DedupOutcome> {
	let start = Instant::now();

	let files = dataset::discover(embeddings, config.file_limit())
		.with_context(|| format!("Failed to list {}", embeddings.display()))?;
	if files.is_empty() {
		bail!("No embedding files found in {}", embeddings.display());
	}
	ui::info(&format!(
		"Found {} embedding files in {}",
		files.len(),
		ui::path_link(embeddings, 40)
	));

	let manifest = InputManifest::build(embeddings, &files).context("Failed to hash embedding files")?;
	ui::debug(&format!("Manifest checksum: {}", manifest.checksum()));

	let state = config.state_dir();
	let root = store_root(&state, &manifest, &config.id_field, &config.embedding_field);
	let mut store = EmbeddingStore::open(&root)?;
	let stats = ingest(&mut store, &manifest, &config.id_field, &config.embedding_field, pool)
		.context("Failed to ingest embeddings")?;
	if stats.ingested > 0 {
		ui::success(&format!(
			"Ingested {} embeddings from {} files",
			stats.embeddings, stats.ingested
		));
	}

	let cache = DedupResultCache::open(&state)?;
	if force {
		ui::debug("Force flag set, evicting cached results");
		cache.evict(&RunFingerprint::run(config, &manifest))?;
		cache.evict(&RunFingerprint::clustering(config, &manifest))?;
	}

	let engine = SemDedup::from_config(config.clone())?;
	let outcome = engine.identify_duplicates(&store, &manifest, &cache, pool)?;
	print_summary(&outcome, start.elapsed().as_secs_f32());
	Ok(outcome)
}

fn print_summary(outcome: &DedupOutcome, elapsed: f32) {
	let groups = outcome.groups().count();
	ui::header("─── Results ───");
	ui::info(&format!("Documents:  {}", outcome.total_documents()));
	ui::info(&format!("Clusters:   {}", outcome.artifact.assignment.num_clusters()));
	ui::info(&format!("Groups:     {}", groups));
	ui::info(&format!(
		"Duplicates: {}",
		outcome.duplicates().len().to_string().bright_yellow()
	));
	ui::info(&format!("Unique:     {}", outcome.unique_documents()));

	if let Some(largest) = outcome.groups().max_by_key(|g| g.len()) {
		ui::debug(&format!(
			"Largest group: {} members, keeper {}, min similarity {:.4}",
			largest.len(),
			largest.keeper,
			largest.min_similarity
		));
	}

	let source = if outcome.cache_hit { "cached" } else { "computed" };
	ui::debug(&format!(
		"{}",
		format!("Run {} ({}) in {:.2}s", outcome.fingerprint.short(), source, elapsed).dimmed()
	));
}
