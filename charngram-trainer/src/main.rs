use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use charngram_core::io::{build_output_path, load_tables, open_corpus, save_tables};
use charngram_core::tokenize::tokenize_file;
use charngram_core::{Alphabet, AlphabetKind, CapacityLimits, SanitizeMode, TrainConfig, Trainer};

/// Estimate character n-gram probability tables from a word list.
#[derive(Parser)]
#[command(name = "charngram-trainer", version)]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Train tables from a corpus holding one word per line
	Train(TrainArgs),
	/// Split raw text into one word per line
	Tokenize {
		/// Raw text file
		input: PathBuf,
		/// Output file, must not exist yet
		output: PathBuf,
	},
	/// Print a summary of a tables file
	Inspect {
		tables: PathBuf,
		/// Number of most likely symbols to list
		#[arg(long, default_value_t = 10)]
		top: usize,
	},
}

#[derive(Args)]
struct TrainArgs {
	/// One word per line
	corpus: PathBuf,
	/// alnum, test, extended or diacritics
	#[arg(long, default_value = "alnum")]
	alphabet: AlphabetKind,
	/// Also compute the quadgram table (A^4 cells)
	#[arg(long)]
	quadgrams: bool,
	/// Fail on characters outside the alphabet instead of dropping them
	#[arg(long)]
	strict: bool,
	/// Lowercase input (default depends on the alphabet)
	#[arg(long, conflicts_with = "keep_case")]
	fold_case: bool,
	/// Keep input case (default depends on the alphabet)
	#[arg(long)]
	keep_case: bool,
	/// Refuse tensors larger than this many cells
	#[arg(long, default_value_t = CapacityLimits::default().max_cells)]
	max_cells: u64,
	/// Counting threads, 0 for one per CPU
	#[arg(long, default_value_t = 1)]
	jobs: usize,
	/// Output file (default: corpus path with a .bin extension)
	#[arg(long, short)]
	output: Option<PathBuf>,
}

impl TrainArgs {
	fn config(&self) -> TrainConfig {
		let mut config = TrainConfig::for_kind(self.alphabet);
		config.quadgrams = self.quadgrams;
		if self.strict {
			config.mode = SanitizeMode::Strict;
		}
		if self.fold_case {
			config.fold_case = true;
		} else if self.keep_case {
			config.fold_case = false;
		}
		config.limits.max_cells = self.max_cells;
		config.jobs = self.jobs;
		config
	}
}

fn train(args: &TrainArgs) -> Result<()> {
	let output = match &args.output {
		Some(path) => path.clone(),
		None => build_output_path(&args.corpus, "bin")?,
	};
	let trainer = Trainer::new(Alphabet::from_kind(args.alphabet), args.config());
	info!("training on {} with the {} alphabet", args.corpus.display(), args.alphabet);

	let corpus = open_corpus(&args.corpus).with_context(|| format!("cannot open {}", args.corpus.display()))?;
	let tables = trainer.train_reader(corpus).context("training failed")?;
	info!("{tables}");

	save_tables(&tables, &output).with_context(|| format!("cannot write {}", output.display()))?;
	println!("{}", output.display());
	Ok(())
}

fn inspect(path: &Path, top: usize) -> Result<()> {
	let tables = load_tables(path).with_context(|| format!("cannot load {}", path.display()))?;
	let alphabet = tables.alphabet();
	println!("{tables}");
	println!("symbols: {}", alphabet.symbols().iter().collect::<String>());

	let mut unigram: Vec<(char, f64)> = alphabet
		.symbols()
		.iter()
		.copied()
		.zip(tables.unigram().as_slice().iter().copied())
		.collect();
	unigram.sort_by(|a, b| b.1.total_cmp(&a.1));
	for (symbol, p) in unigram.into_iter().take(top) {
		println!("{symbol:?}\t{p:.6}");
	}

	for order in 2..=tables.max_order() {
		if let Some(table) = tables.table(order) {
			let drift = table
				.slices()
				.map(|slice| (slice.iter().sum::<f64>() - 1.0).abs())
				.fold(0.0, f64::max);
			println!("order {order}: max |slice sum - 1| = {drift:e}");
		}
	}
	Ok(())
}

fn main() -> Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	match Cli::parse().command {
		Command::Train(args) => train(&args),
		Command::Tokenize { input, output } => {
			let written = tokenize_file(&input, &output)
				.with_context(|| format!("cannot tokenize {} into {}", input.display(), output.display()))?;
			println!("{written} words written to {}", output.display());
			Ok(())
		}
		Command::Inspect { tables, top } => inspect(&tables, top),
	}
}
