//! Remove command - filter a dataset against a duplicates file

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::DedupConfig;
use crate::core::DuplicateIdSet;
use crate::processing::{apply_files, RemovalStats};
use crate::runtime::WorkerPool;
use crate::storage::dataset;
use crate::ui;

pub fn run(
	input: &Path,
	duplicates: &Path,
	output_dir: &Path,
	config: &DedupConfig,
	pool: &WorkerPool,
) -> Result<()> {
	let ids = dataset::read_duplicates(duplicates, &config.id_field)
		.with_context(|| format!("Failed to read {}", duplicates.display()))?;
	ui::info(&format!("Loaded {} duplicate ids", ids.len()));
	apply(input, output_dir, &ids, config, pool)?;
	Ok(())
}

/// Write every dataset file under `input` to `output_dir` minus `duplicates`
pub(crate) fn apply(
	input: &Path,
	output_dir: &Path,
	duplicates: &DuplicateIdSet,
	config: &DedupConfig,
	pool: &WorkerPool,
) -> Result<RemovalStats> {
	let files = dataset::discover(input, config.file_limit())
		.with_context(|| format!("Failed to list {}", input.display()))?;
	if files.is_empty() {
		bail!("No dataset files found in {}", input.display());
	}
	ui::info(&format!("Filtering {} files from {}", files.len(), ui::path_link(input, 40)));

	let stats = apply_files(&files, input, output_dir, duplicates, &config.id_field, pool)?;
	ui::success(&format!(
		"Kept {} documents, removed {} across {} files",
		stats.kept, stats.removed, stats.files
	));
	ui::info(&format!("Filtered dataset: {}", ui::path_link(output_dir, 50)));

	if stats.removed < duplicates.len() {
		ui::debug(&format!(
			"{} duplicate ids were not present in the dataset",
			duplicates.len() - stats.removed
		));
	}
	Ok(stats)
}
