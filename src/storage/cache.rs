//! Fingerprint-keyed cache of cluster assignments and duplicate groups
//!
//! Layout under the state directory:
//!
//! ```text
//! runs/<fingerprint>/assignment.msgpack
//! runs/<fingerprint>/groups/cluster-00000.msgpack
//! runs/<fingerprint>/duplicates.msgpack
//! runs/<fingerprint>/COMPLETE
//! clustering/<fingerprint>/assignment.msgpack
//! clustering/<fingerprint>/COMPLETE
//! ```
//!
//! Entries are written into a staging directory and renamed into place after
//! the `COMPLETE` marker, which lists an xxh3 hash of every file. An entry
//! whose marker is missing or disagrees with its files is a miss.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::{
	ASSIGNMENT_FILE, ARTIFACT_EXT, CACHE_FORMAT_VERSION, CLUSTERING_DIR, DUPLICATES_FILE, GROUPS_DIR, MARKER_FILE,
	PARTIAL_SUFFIX, RUNS_DIR,
};
use crate::core::{ClusterAssignment, ContentHash, DuplicateGroup, DuplicateIdSet, RunFingerprint};
use crate::error::{DedupError, Result};
use crate::ui;

/// Everything a completed run produces
#[derive(Debug, Clone, PartialEq)]
pub struct RunArtifact {
	pub assignment: ClusterAssignment,
	/// Duplicate groups indexed by cluster id
	pub groups: Vec<Vec<DuplicateGroup>>,
	pub duplicates: DuplicateIdSet,
}

impl RunArtifact {
	pub fn all_groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
		self.groups.iter().flatten()
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct Marker {
	version: u32,
	fingerprint: String,
	created: String,
	/// File name (relative, `/`-separated) -> content hash
	files: BTreeMap<String, ContentHash>,
}

/// Outcome of [`DedupResultCache::clean`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanStats {
	pub partial: usize,
	pub corrupt: usize,
	pub valid: usize,
}

pub struct DedupResultCache {
	root: PathBuf,
	reported: Mutex<HashSet<PathBuf>>,
}

impl DedupResultCache {
	/// Open the cache under `state_dir`, creating its directories
	pub fn open(state_dir: &Path) -> Result<Self> {
		for sub in [RUNS_DIR, CLUSTERING_DIR] {
			let dir = state_dir.join(sub);
			fs::create_dir_all(&dir).map_err(|e| DedupError::storage(&dir, e))?;
		}
		Ok(Self {
			root: state_dir.to_path_buf(),
			reported: Mutex::new(HashSet::new()),
		})
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Cached run artifact for `fingerprint`, or `None` on a miss or a corrupt entry
	pub fn get(&self, fingerprint: &RunFingerprint) -> Result<Option<RunArtifact>> {
		let dir = self.run_dir(fingerprint);
		let decoded = read_entry(&dir, fingerprint.as_str()).and_then(|files| match files {
			Some(files) => decode_run(&dir, &files).map(Some),
			None => Ok(None),
		});
		self.miss_on_corrupt(decoded)
	}

	pub fn put(&self, fingerprint: &RunFingerprint, artifact: &RunArtifact) -> Result<()> {
		let mut files = vec![(ASSIGNMENT_FILE.to_string(), encode(&artifact.assignment)?)];
		for (cluster, groups) in artifact.groups.iter().enumerate() {
			files.push((group_file(cluster), encode(groups)?));
		}
		files.push((DUPLICATES_FILE.to_string(), encode(&artifact.duplicates)?));

		write_entry(&self.run_dir(fingerprint), fingerprint.as_str(), files)?;
		ui::debug(&format!("Cached run {}", fingerprint.short()));
		Ok(())
	}

	/// Cached clustering for a clustering fingerprint
	pub fn get_assignment(&self, fingerprint: &RunFingerprint) -> Result<Option<ClusterAssignment>> {
		let dir = self.clustering_dir(fingerprint);
		let decoded = read_entry(&dir, fingerprint.as_str()).and_then(|files| match files {
			Some(files) => decode(&dir, &files, ASSIGNMENT_FILE).map(Some),
			None => Ok(None),
		});
		self.miss_on_corrupt(decoded)
	}

	pub fn put_assignment(&self, fingerprint: &RunFingerprint, assignment: &ClusterAssignment) -> Result<()> {
		let files = vec![(ASSIGNMENT_FILE.to_string(), encode(assignment)?)];
		write_entry(&self.clustering_dir(fingerprint), fingerprint.as_str(), files)?;
		ui::debug(&format!("Cached clustering {}", fingerprint.short()));
		Ok(())
	}

	/// Drop any run or clustering entry stored under `fingerprint`
	pub fn evict(&self, fingerprint: &RunFingerprint) -> Result<()> {
		for dir in [self.run_dir(fingerprint), self.clustering_dir(fingerprint)] {
			if dir.exists() {
				fs::remove_dir_all(&dir).map_err(|e| DedupError::storage(&dir, e))?;
				ui::debug(&format!("Evicted {}", dir.display()));
			}
		}
		Ok(())
	}

	/// Remove staging leftovers and entries that fail verification
	pub fn clean(&self) -> Result<CleanStats> {
		let mut stats = CleanStats::default();
		for sub in [RUNS_DIR, CLUSTERING_DIR] {
			let parent = self.root.join(sub);
			let Ok(entries) = fs::read_dir(&parent) else {
				continue;
			};
			for entry in entries.filter_map(|e| e.ok()) {
				let path = entry.path();
				if !path.is_dir() {
					continue;
				}
				let name = entry.file_name().to_string_lossy().to_string();
				if name.contains(PARTIAL_SUFFIX) {
					fs::remove_dir_all(&path).map_err(|e| DedupError::storage(&path, e))?;
					stats.partial += 1;
				} else if read_entry(&path, &name).map_or(true, |files| files.is_none()) {
					fs::remove_dir_all(&path).map_err(|e| DedupError::storage(&path, e))?;
					ui::debug(&format!("Removed corrupt cache entry {}", path.display()));
					stats.corrupt += 1;
				} else {
					stats.valid += 1;
				}
			}
		}
		Ok(stats)
	}

	fn run_dir(&self, fingerprint: &RunFingerprint) -> PathBuf {
		self.root.join(RUNS_DIR).join(fingerprint.as_str())
	}

	fn clustering_dir(&self, fingerprint: &RunFingerprint) -> PathBuf {
		self.root.join(CLUSTERING_DIR).join(fingerprint.as_str())
	}

	/// Corrupt entries are logged once each and treated as misses
	fn miss_on_corrupt<T>(&self, result: Result<Option<T>>) -> Result<Option<T>> {
		match result {
			Err(DedupError::CacheCorrupt { path, reason }) => {
				let first = self
					.reported
					.lock()
					.map(|mut seen| seen.insert(path.clone()))
					.unwrap_or(true);
				if first {
					ui::warn(&format!("Ignoring corrupt cache entry {}: {}", path.display(), reason));
				}
				Ok(None)
			}
			other => other,
		}
	}
}

fn group_file(cluster: usize) -> String {
	format!("{}/cluster-{:05}.{}", GROUPS_DIR, cluster, ARTIFACT_EXT)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
	rmp_serde::to_vec(value).map_err(|e| DedupError::Io(std::io::Error::other(e)))
}

fn decode<T: DeserializeOwned>(dir: &Path, files: &BTreeMap<String, Vec<u8>>, name: &str) -> Result<T> {
	let bytes = files
		.get(name)
		.ok_or_else(|| DedupError::corrupt(dir, format!("missing {}", name)))?;
	rmp_serde::from_slice(bytes).map_err(|e| DedupError::corrupt(dir.join(name), e.to_string()))
}

fn decode_run(dir: &Path, files: &BTreeMap<String, Vec<u8>>) -> Result<RunArtifact> {
	let assignment: ClusterAssignment = decode(dir, files, ASSIGNMENT_FILE)?;
	let groups = (0..assignment.num_clusters())
		.map(|cluster| decode(dir, files, &group_file(cluster)))
		.collect::<Result<Vec<Vec<DuplicateGroup>>>>()?;
	let duplicates = decode(dir, files, DUPLICATES_FILE)?;
	Ok(RunArtifact {
		assignment,
		groups,
		duplicates,
	})
}

/// Stage every file, write the marker last, then move the entry into place
fn write_entry(dir: &Path, fingerprint: &str, files: Vec<(String, Vec<u8>)>) -> Result<()> {
	let staging = dir.with_file_name(format!("{}{}-{}", fingerprint, PARTIAL_SUFFIX, std::process::id()));
	if staging.exists() {
		fs::remove_dir_all(&staging).map_err(|e| DedupError::storage(&staging, e))?;
	}
	fs::create_dir_all(&staging).map_err(|e| DedupError::storage(&staging, e))?;

	let mut hashes = BTreeMap::new();
	for (name, bytes) in files {
		let path = staging.join(&name);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|e| DedupError::storage(parent, e))?;
		}
		fs::write(&path, &bytes).map_err(|e| DedupError::storage(&path, e))?;
		hashes.insert(name, ContentHash::of_bytes(&bytes));
	}

	let marker = Marker {
		version: CACHE_FORMAT_VERSION,
		fingerprint: fingerprint.to_string(),
		created: chrono::Utc::now().to_rfc3339(),
		files: hashes,
	};
	let marker_path = staging.join(MARKER_FILE);
	let marker_bytes = serde_json::to_vec_pretty(&marker).map_err(|e| DedupError::Io(e.into()))?;
	fs::write(&marker_path, marker_bytes).map_err(|e| DedupError::storage(&marker_path, e))?;

	if dir.exists() {
		fs::remove_dir_all(dir).map_err(|e| DedupError::storage(dir, e))?;
	}
	fs::rename(&staging, dir).map_err(|e| DedupError::storage(dir, e))?;
	Ok(())
}

/// Read and verify an entry. `Ok(None)` when absent, `CacheCorrupt` when
/// present but unverifiable.
fn read_entry(dir: &Path, fingerprint: &str) -> Result<Option<BTreeMap<String, Vec<u8>>>> {
	if !dir.exists() {
		return Ok(None);
	}
	let marker_path = dir.join(MARKER_FILE);
	let marker_bytes = fs::read(&marker_path).map_err(|_| DedupError::corrupt(dir, "missing integrity marker"))?;
	let marker: Marker = serde_json::from_slice(&marker_bytes)
		.map_err(|e| DedupError::corrupt(&marker_path, e.to_string()))?;

	if marker.version != CACHE_FORMAT_VERSION {
		return Err(DedupError::corrupt(dir, format!("format version {}", marker.version)));
	}
	if marker.fingerprint != fingerprint {
		return Err(DedupError::corrupt(dir, "fingerprint mismatch"));
	}

	let mut files = BTreeMap::new();
	for (name, expected) in marker.files {
		let path = dir.join(&name);
		let bytes = fs::read(&path).map_err(|e| DedupError::corrupt(&path, e.to_string()))?;
		if ContentHash::of_bytes(&bytes) != expected {
			return Err(DedupError::corrupt(&path, "checksum mismatch"));
		}
		files.insert(name, bytes);
	}
	Ok(Some(files))
}
