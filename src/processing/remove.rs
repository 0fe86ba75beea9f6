//! Dropping identified duplicates from a dataset

use std::path::{Path, PathBuf};

use crate::core::{Document, DuplicateIdSet};
use crate::error::{DedupError, Result};
use crate::runtime::WorkerPool;
use crate::storage::dataset;

/// Every document whose id is not in `duplicates`, in input order
pub fn apply(dataset: &[Document], duplicates: &DuplicateIdSet) -> Vec<Document> {
	dataset
		.iter()
		.filter(|doc| !duplicates.contains(&doc.id))
		.cloned()
		.collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RemovalStats {
	pub files: usize,
	pub kept: usize,
	pub removed: usize,
}

/// Filter each input file into a file of the same relative path under
/// `output_dir`, one task per file.
pub fn apply_files(
	files: &[PathBuf],
	input_root: &Path,
	output_dir: &Path,
	duplicates: &DuplicateIdSet,
	id_field: &str,
	pool: &WorkerPool,
) -> Result<RemovalStats> {
	let same_dir = match (input_root.canonicalize(), output_dir.canonicalize()) {
		(Ok(input), Ok(output)) => input == output,
		_ => false,
	};
	if same_dir {
		return Err(DedupError::InvalidConfig(format!(
			"output directory {} must differ from the input directory",
			output_dir.display()
		)));
	}

	let per_file = pool.map(files, |file| {
		let documents = dataset::read_documents(file, id_field)?;
		let kept = apply(&documents, duplicates);
		let relative = file.strip_prefix(input_root).unwrap_or(file.as_path());
		let target = output_dir.join(relative);
		dataset::write_documents(&target, &kept)?;
		Ok((kept.len(), documents.len() - kept.len()))
	})?;

	Ok(per_file.into_iter().fold(
		RemovalStats::default(),
		|stats, (kept, removed)| RemovalStats {
			files: stats.files + 1,
			kept: stats.kept + kept,
			removed: stats.removed + removed,
		},
	))
}
