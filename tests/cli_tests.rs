//! CLI integration tests for semdedup.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[allow(deprecated)]
fn cmd() -> Command {
	Command::cargo_bin("semdedup").unwrap()
}

/// d1..d3 identical, d4/d5 identical, d6 on its own
fn write_scenario(dir: &Path) {
	write_rows(
		dir,
		&[
			("d1", "[1.0, 0.0, 0.0]"),
			("d2", "[1.0, 0.0, 0.0]"),
			("d3", "[1.0, 0.0, 0.0]"),
			("d4", "[0.0, 1.0, 0.0]"),
			("d5", "[0.0, 1.0, 0.0]"),
			("d6", "[0.0, 0.0, 1.0]"),
		],
	);
}

/// Six rows split over part-0 (first three) and part-1
fn write_rows(dir: &Path, rows: &[(&str, &str); 6]) {
	fs::create_dir_all(dir).unwrap();
	let lines: Vec<String> = rows
		.iter()
		.map(|(id, v)| format!("{{\"id\":\"{}\",\"embedding\":{},\"text\":\"{} body\"}}", id, v, id))
		.collect();
	fs::write(dir.join("part-0.jsonl"), lines[..3].join("\n") + "\n").unwrap();
	fs::write(dir.join("part-1.jsonl"), lines[3..].join("\n") + "\n").unwrap();
}

fn ids_in(path: &Path) -> Vec<String> {
	fs::read_to_string(path)
		.unwrap()
		.lines()
		.map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["id"].as_str().unwrap().to_string())
		.collect()
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help() {
	cmd()
		.arg("--help")
		.assert()
		.success()
		.stdout(predicate::str::contains("Semantic deduplication"));
}

#[test]
fn test_version() {
	cmd()
		.arg("--version")
		.assert()
		.success()
		.stdout(predicate::str::contains("semdedup"));
}

#[test]
fn test_run_help_lists_remove() {
	cmd()
		.args(["run", "--help"])
		.assert()
		.success()
		.stdout(predicate::str::contains("--remove"));
}

// ============================================================================
// Argument Validation Tests
// ============================================================================

#[test]
fn test_threshold_out_of_range() {
	cmd()
		.args(["identify", "-e", "missing", "-t", "1.5"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("threshold"));
}

#[test]
fn test_unknown_config_key() {
	let temp = TempDir::new().unwrap();
	let config = temp.path().join("dedup.yaml");
	fs::write(&config, "n_clusters: 2\nclusterz: 3\n").unwrap();

	cmd()
		.args(["clean", "-c", config.to_str().unwrap()])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_too_many_clusters() {
	let temp = TempDir::new().unwrap();
	let embeddings = temp.path().join("embs");
	write_scenario(&embeddings);

	cmd()
		.args(["identify", "-e", embeddings.to_str().unwrap(), "-k", "50"])
		.arg("--cache-dir")
		.arg(temp.path().join("cache"))
		.assert()
		.failure()
		.stderr(predicate::str::contains("n_clusters"));
}

// ============================================================================
// End-to-end Tests
// ============================================================================

#[test]
fn test_run_with_remove() {
	let temp = TempDir::new().unwrap();
	let embeddings = temp.path().join("embs");
	let cache = temp.path().join("cache");
	let filtered = temp.path().join("filtered");
	write_scenario(&embeddings);

	cmd()
		.args(["run", "-e", embeddings.to_str().unwrap(), "-k", "2", "-t", "0.99", "--remove"])
		.arg("--cache-dir")
		.arg(&cache)
		.arg("--output-dir")
		.arg(&filtered)
		.assert()
		.success()
		.stderr(predicate::str::contains("Kept 3 documents, removed 3"));

	assert_eq!(ids_in(&cache.join("duplicates.jsonl")), vec!["d2", "d3", "d5"]);
	assert_eq!(ids_in(&filtered.join("part-0.jsonl")), vec!["d1"]);
	assert_eq!(ids_in(&filtered.join("part-1.jsonl")), vec!["d4", "d6"]);
	assert!(cache.join("semdedup.log").exists());
}

#[test]
fn test_identify_then_remove() {
	let temp = TempDir::new().unwrap();
	let embeddings = temp.path().join("embs");
	let cache = temp.path().join("cache");
	let duplicates = temp.path().join("dups.jsonl");
	let filtered = temp.path().join("out");
	write_scenario(&embeddings);

	cmd()
		.args(["identify", "-e", embeddings.to_str().unwrap(), "-k", "2"])
		.arg("--cache-dir")
		.arg(&cache)
		.arg("-o")
		.arg(&duplicates)
		.assert()
		.success();

	// Second run is served from the cache
	cmd()
		.args(["-v", "identify", "-e", embeddings.to_str().unwrap(), "-k", "2"])
		.arg("--cache-dir")
		.arg(&cache)
		.arg("-o")
		.arg(&duplicates)
		.assert()
		.success()
		.stderr(predicate::str::contains("Using cached results"));

	cmd()
		.args(["remove", "-i", embeddings.to_str().unwrap()])
		.arg("-d")
		.arg(&duplicates)
		.arg("-o")
		.arg(&filtered)
		.arg("--cache-dir")
		.arg(&cache)
		.assert()
		.success();

	let payload = fs::read_to_string(filtered.join("part-0.jsonl")).unwrap();
	assert!(payload.contains("d1 body"));
	assert!(!payload.contains("d2"));
}

#[test]
fn test_remove_refuses_input_as_output() {
	let temp = TempDir::new().unwrap();
	let embeddings = temp.path().join("embs");
	write_scenario(&embeddings);
	let duplicates = temp.path().join("dups.jsonl");
	fs::write(&duplicates, "{\"id\":\"d2\"}\n").unwrap();

	cmd()
		.args(["remove", "-i", embeddings.to_str().unwrap()])
		.arg("-d")
		.arg(&duplicates)
		.arg("-o")
		.arg(&embeddings)
		.arg("--cache-dir")
		.arg(temp.path().join("cache"))
		.assert()
		.failure()
		.stderr(predicate::str::contains("must differ"));
}

#[test]
fn test_clean_removes_partial_entries() {
	let temp = TempDir::new().unwrap();
	let cache = temp.path().join("cache");
	fs::create_dir_all(cache.join("semdedup/runs/abc.partial-1")).unwrap();

	cmd()
		.arg("clean")
		.arg("--cache-dir")
		.arg(&cache)
		.assert()
		.success()
		.stderr(predicate::str::contains("Removed 1 interrupted writes"));

	assert!(!cache.join("semdedup/runs/abc.partial-1").exists());
}

// ============================================================================
// Rerun Tests
// ============================================================================

#[test]
fn test_reembed_at_new_dimension() {
	let temp = TempDir::new().unwrap();
	let embeddings = temp.path().join("embs");
	let cache = temp.path().join("cache");
	let duplicates = temp.path().join("dups.jsonl");
	write_scenario(&embeddings);

	let identify = || {
		cmd()
			.args(["identify", "-e", embeddings.to_str().unwrap(), "-k", "2"])
			.arg("--cache-dir")
			.arg(&cache)
			.arg("-o")
			.arg(&duplicates)
			.assert()
			.success();
	};
	identify();

	write_rows(
		&embeddings,
		&[
			("d1", "[1.0, 0.0]"),
			("d2", "[1.0, 0.0]"),
			("d3", "[1.0, 0.0]"),
			("d4", "[0.0, 1.0]"),
			("d5", "[0.0, 1.0]"),
			("d6", "[-1.0, 0.0]"),
		],
	);
	identify();
	assert_eq!(ids_in(&duplicates), vec!["d2", "d3", "d5"]);
}

#[test]
fn test_embedding_field_change_is_recomputed() {
	let temp = TempDir::new().unwrap();
	let embeddings = temp.path().join("embs");
	let cache = temp.path().join("cache");
	let duplicates = temp.path().join("dups.jsonl");
	fs::create_dir_all(&embeddings).unwrap();
	fs::write(
		embeddings.join("docs.jsonl"),
		"{\"id\":\"d1\",\"embedding\":[1,0],\"alt\":[1,0]}\n{\"id\":\"d2\",\"embedding\":[1,0],\"alt\":[0,1]}\n",
	)
	.unwrap();
	let alt_config = temp.path().join("alt.yaml");
	fs::write(&alt_config, "embedding_field: alt\nn_clusters: 1\n").unwrap();

	cmd()
		.args(["identify", "-e", embeddings.to_str().unwrap(), "-k", "1"])
		.arg("--cache-dir")
		.arg(&cache)
		.arg("-o")
		.arg(&duplicates)
		.assert()
		.success();
	assert_eq!(ids_in(&duplicates), vec!["d2"]);

	cmd()
		.args(["identify", "-e", embeddings.to_str().unwrap()])
		.arg("-c")
		.arg(&alt_config)
		.arg("--cache-dir")
		.arg(&cache)
		.arg("-o")
		.arg(&duplicates)
		.assert()
		.success();
	assert!(ids_in(&duplicates).is_empty());
}

#[test]
fn test_non_positive_num_files_reads_everything() {
	for limit in ["0", "-1"] {
		let temp = TempDir::new().unwrap();
		let embeddings = temp.path().join("embs");
		let duplicates = temp.path().join("dups.jsonl");
		write_scenario(&embeddings);

		cmd()
			.args(["identify", "-e", embeddings.to_str().unwrap(), "-k", "2", "-n", limit])
			.arg("--cache-dir")
			.arg(temp.path().join("cache"))
			.arg("-o")
			.arg(&duplicates)
			.assert()
			.success();
		assert_eq!(ids_in(&duplicates), vec!["d2", "d3", "d5"], "-n {}", limit);
	}
}
