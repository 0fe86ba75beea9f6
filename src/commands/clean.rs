//! Clean command - prune partial and corrupt cache entries

use anyhow::{Context, Result};

use crate::config::DedupConfig;
use crate::storage::DedupResultCache;
use crate::ui;

pub fn run(config: &DedupConfig) -> Result<()> {
	let state = config.state_dir();
	if !state.exists() {
		ui::success("No cache to clean");
		return Ok(());
	}

	ui::info(&format!("Scanning cache: {}", ui::path_link(&state, 50)));
	let cache = DedupResultCache::open(&state)?;
	let stats = cache.clean().context("Failed to clean cache")?;

	if stats.partial == 0 && stats.corrupt == 0 {
		ui::success(&format!("Cache is clean ({} valid entries)", stats.valid));
		return Ok(());
	}

	if stats.partial > 0 {
		ui::warn(&format!("Removed {} interrupted writes", stats.partial));
	}
	if stats.corrupt > 0 {
		ui::warn(&format!("Removed {} corrupt entries", stats.corrupt));
	}
	ui::success(&format!("Cleaned cache, {} valid entries remain", stats.valid));
	Ok(())
}
