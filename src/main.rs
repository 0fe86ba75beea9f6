//! semdedup - find and remove semantic near-duplicates in a corpus

use anyhow::{Context, Result};
use clap::Parser;

use semdedup::cli::{Cli, Command};
use semdedup::commands;
use semdedup::commands::run::RunOptions;
use semdedup::runtime::WorkerPool;
use semdedup::ui::{self, Log};

fn main() -> Result<()> {
	let cli = Cli::parse();
	Log::set_verbose(cli.verbose);

	let args = match &cli.command {
		Command::Identify { config, .. }
		| Command::Remove { config, .. }
		| Command::Run { config, .. }
		| Command::Clean { config } => config,
	};
	let config = args.resolve().context("Invalid configuration")?;

	if let Err(e) = Log::set_file(&config.log_path()) {
		ui::warn(&format!("Logging to file disabled: {}", e));
	}
	ui::banner();
	ui::debug(&format!("Config: {:?}", config));

	// Torn down when it goes out of scope at the end of main
	let pool = WorkerPool::new(config.threads)?;

	match cli.command {
		Command::Identify {
			embeddings,
			output,
			force,
			..
		} => commands::identify::run(&embeddings, output.as_deref(), force, &config, &pool).map(|_| ()),
		Command::Remove {
			input,
			duplicates,
			output_dir,
			..
		} => commands::remove::run(&input, &duplicates, &output_dir, &config, &pool),
		Command::Run {
			embeddings,
			input,
			remove,
			output_dir,
			force,
			..
		} => commands::run::run(
			RunOptions {
				embeddings: &embeddings,
				input: input.as_deref(),
				remove,
				output_dir: output_dir.as_deref(),
				force,
			},
			&config,
			&pool,
		),
		Command::Clean { .. } => commands::clean::run(&config),
	}
}
