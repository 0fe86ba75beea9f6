use clap::builder::styling::{AnsiColor, Style, Styles};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{DedupConfig, Metric};

fn parse_threshold(s: &str) -> Result<f32, String> {
	let val: f32 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
	if val <= 0.0 || val > 1.0 {
		Err(format!("threshold must be in (0.0, 1.0], got {}", val))
	} else {
		Ok(val)
	}
}

fn styles() -> Styles {
	Styles::styled()
		.header(Style::new().bold().fg_color(Some(AnsiColor::Blue.into())))
		.usage(Style::new().bold().fg_color(Some(AnsiColor::Blue.into())))
		.literal(Style::new().fg_color(Some(AnsiColor::Blue.into())))
		.placeholder(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
		.valid(Style::new().fg_color(Some(AnsiColor::Blue.into())))
		.invalid(Style::new().fg_color(Some(AnsiColor::Red.into())))
}

#[derive(Parser, Debug)]
#[command(
	name = "semdedup",
	author,
	version,
	about = "Semantic deduplication of embedded document corpora",
	styles = styles(),
	after_help = format!(
		"{title}
  {bin} {identify} {identify_args}          {identify_desc}
  {bin} {run}      {run_args}  {run_desc}
  {bin} {clean}    {clean_args}                  {clean_desc}",
		title = "Examples:".bright_blue().bold(),
		bin = "semdedup".bright_blue(),
		identify = "identify".yellow(),
		identify_args = "-e ./embeddings/ -k 100",
		identify_desc = "Find near-duplicates".dimmed(),
		run = "run".yellow(),
		run_args = "-e ./embs/ -i ./docs/ --remove",
		run_desc = "Find and drop them".dimmed(),
		clean = "clean".yellow(),
		clean_args = "-c dedup.yaml",
		clean_desc = "Prune stale cache entries".dimmed(),
	),
)]
pub struct Cli {
	/// Enable verbose debug output
	#[arg(short = 'v', long = "verbose", global = true)]
	pub verbose: bool,

	#[command(subcommand)]
	pub command: Command,
}

/// Settings shared by every command, layered over the YAML config
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
	/// YAML config file
	#[arg(short = 'c', long = "config", value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Directory for cached embeddings, results and the log file
	#[arg(long = "cache-dir", value_name = "DIR")]
	pub cache_dir: Option<PathBuf>,

	/// Number of k-means clusters
	#[arg(short = 'k', long = "clusters")]
	pub n_clusters: Option<usize>,

	/// Similarity at or above which documents are duplicates (0.0-1.0]
	#[arg(short = 't', long = "threshold", value_parser = parse_threshold)]
	pub threshold: Option<f32>,

	/// Distance metric
	#[arg(short = 'm', long = "metric")]
	pub metric: Option<Metric>,

	/// Random seed for cluster initialisation
	#[arg(long = "seed")]
	pub seed: Option<u64>,

	/// Only process the first N input files (0 or less: all)
	#[arg(short = 'n', long = "num-files", allow_negative_numbers = true)]
	pub num_files: Option<i64>,

	/// Worker threads (default: one per core)
	#[arg(short = 'j', long = "threads")]
	pub threads: Option<usize>,
}

impl ConfigArgs {
	/// Config file (or defaults) with command-line overrides applied
	pub fn resolve(&self) -> crate::Result<DedupConfig> {
		let mut config = match &self.config {
			Some(path) => DedupConfig::from_yaml(path)?,
			None => DedupConfig::default(),
		};
		if let Some(dir) = &self.cache_dir {
			config.cache_dir = dir.clone();
		}
		if let Some(k) = self.n_clusters {
			config.n_clusters = k;
		}
		if let Some(t) = self.threshold {
			config.threshold = t;
		}
		if let Some(m) = self.metric {
			config.metric = m;
		}
		if let Some(seed) = self.seed {
			config.seed = seed;
		}
		if self.num_files.is_some() {
			config.num_files = self.num_files;
		}
		if self.threads.is_some() {
			config.threads = self.threads;
		}
		config.validate()?;
		Ok(config)
	}
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Find near-duplicate documents and write their ids
	Identify {
		/// Directory of JSONL embedding files
		#[arg(short = 'e', long = "embeddings", value_name = "DIR")]
		embeddings: PathBuf,

		/// Where to write the duplicate ids (default: <cache-dir>/duplicates.jsonl)
		#[arg(short = 'o', long = "output", value_name = "FILE")]
		output: Option<PathBuf>,

		/// Ignore cached results and recompute
		#[arg(short = 'f', long = "force")]
		force: bool,

		#[command(flatten)]
		config: ConfigArgs,
	},

	/// Drop documents listed in a duplicates file from a dataset
	Remove {
		/// Directory of JSONL dataset files
		#[arg(short = 'i', long = "input", value_name = "DIR")]
		input: PathBuf,

		/// Duplicate ids written by `identify`
		#[arg(short = 'd', long = "duplicates", value_name = "FILE")]
		duplicates: PathBuf,

		/// Directory for the filtered dataset
		#[arg(short = 'o', long = "output-dir", value_name = "DIR")]
		output_dir: PathBuf,

		#[command(flatten)]
		config: ConfigArgs,
	},

	/// Identify duplicates, then optionally remove them
	Run {
		/// Directory of JSONL embedding files
		#[arg(short = 'e', long = "embeddings", value_name = "DIR")]
		embeddings: PathBuf,

		/// Directory of JSONL dataset files (defaults to the embeddings directory)
		#[arg(short = 'i', long = "input", value_name = "DIR")]
		input: Option<PathBuf>,

		/// Also write the filtered dataset
		#[arg(short = 'r', long = "remove")]
		remove: bool,

		/// Directory for the filtered dataset (default: <cache-dir>/filtered)
		#[arg(short = 'o', long = "output-dir", value_name = "DIR")]
		output_dir: Option<PathBuf>,

		/// Ignore cached results and recompute
		#[arg(short = 'f', long = "force")]
		force: bool,

		#[command(flatten)]
		config: ConfigArgs,
	},

	/// Remove partial and corrupt cache entries
	Clean {
		#[command(flatten)]
		config: ConfigArgs,
	},
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn cli_definition_is_valid() {
		Cli::command().debug_assert();
	}

	#[test]
	fn overrides_take_precedence() {
		let cli = Cli::parse_from([
			"semdedup", "identify", "-e", "embs", "-k", "4", "-t", "0.9", "--metric", "l2", "--seed", "3",
		]);
		let Command::Identify { config, .. } = cli.command else {
			panic!("expected identify");
		};
		let resolved = config.resolve().unwrap();
		assert_eq!(resolved.n_clusters, 4);
		assert_eq!(resolved.threshold, 0.9);
		assert_eq!(resolved.metric, Metric::L2);
		assert_eq!(resolved.seed, 3);
		assert_eq!(resolved.id_field, "id");
	}

	#[test]
	fn negative_file_count_parses() {
		let cli = Cli::parse_from(["semdedup", "identify", "-e", "embs", "-n", "-1"]);
		let Command::Identify { config, .. } = cli.command else {
			panic!("expected identify");
		};
		let resolved = config.resolve().unwrap();
		assert_eq!(resolved.num_files, Some(-1));
		assert_eq!(resolved.file_limit(), None);
	}

	#[test]
	fn rejects_out_of_range_threshold() {
		assert!(Cli::try_parse_from(["semdedup", "identify", "-e", "x", "-t", "1.5"]).is_err());
	}
}
