//! Run command - identify, then optionally remove

use std::path::Path;

use anyhow::Result;

use crate::config::{DedupConfig, FILTERED_DIR};
use crate::runtime::WorkerPool;
use crate::ui;

use super::{identify, remove};

pub struct RunOptions<'a> {
	pub embeddings: &'a Path,
	/// Dataset to filter; the embeddings directory when absent
	pub input: Option<&'a Path>,
	pub remove: bool,
	pub output_dir: Option<&'a Path>,
	pub force: bool,
}

pub fn run(options: RunOptions<'_>, config: &DedupConfig, pool: &WorkerPool) -> Result<()> {
	let outcome = identify::run(options.embeddings, None, options.force, config, pool)?;

	if !options.remove {
		ui::debug("Skipping removal, pass --remove to write the filtered dataset");
		return Ok(());
	}

	let input = options.input.unwrap_or(options.embeddings);
	let output_dir = options
		.output_dir
		.map(Path::to_path_buf)
		.unwrap_or_else(|| config.cache_dir.join(FILTERED_DIR));

	ui::header("─── Removal ───");
	remove::apply(input, &output_dir, outcome.duplicates(), config, pool)?;
	Ok(())
}
