use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use log::{debug, info};

use super::conditional::estimate_conditional;
use super::counter::{CountTable, NGramCounts};
use super::joint::{CapacityLimits, estimate_joint, tensor_cells};
use super::tables::NGramTables;
use crate::alphabet::{Alphabet, AlphabetKind};
use crate::error::{NgramError, Result};
use crate::sanitizer::{SanitizeMode, Sanitizer};

/// Settings of a training run.
///
/// # Defaults
/// - no quadgrams, lenient sanitization, case folding on
/// - [`CapacityLimits::default`]
/// - a single counting thread
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
	/// Also count order 4 and produce the quadgram table.
	pub quadgrams: bool,
	/// Drop or reject characters outside the alphabet.
	pub mode: SanitizeMode,
	/// Lowercase input before lookup.
	pub fold_case: bool,
	/// Tensor size ceilings, checked before the corpus is read.
	pub limits: CapacityLimits,
	/// Counting threads. `0` means one per CPU.
	pub jobs: usize,
	/// Lines read per batch when counting on several threads.
	pub batch_lines: usize,
	/// Log progress every this many lines (`0` disables).
	pub progress_every: usize,
}

impl Default for TrainConfig {
	fn default() -> Self {
		Self {
			quadgrams: false,
			mode: SanitizeMode::Lenient,
			fold_case: true,
			limits: CapacityLimits::default(),
			jobs: 1,
			batch_lines: 1 << 16,
			progress_every: 1_000_000,
		}
	}
}

impl TrainConfig {
	/// Default settings with the case folding of a built-in alphabet.
	pub fn for_kind(kind: AlphabetKind) -> Self {
		Self { fold_case: kind.folds_case(), ..Self::default() }
	}
}

/// Drives a training run: one pass over the corpus, then estimation.
///
/// # Behavior
/// - Capacity of the largest requested tensor is checked first
/// - Each line is sanitized and its n-grams counted for orders 1..=3
///   (1..=4 with quadgrams)
/// - Tables are estimated in dependency order: unigram, bigram joint and
///   conditional, trigram joint and conditional, then quadgram
///
/// # Notes
/// - An optional abort flag is polled between lines
/// - With `jobs > 1`, lines are read in batches and each batch is split
///   across threads; partial counts are merged in batch order
pub struct Trainer {
	alphabet: Alphabet,
	config: TrainConfig,
	abort: Option<Arc<AtomicBool>>,
}

impl Trainer {
	pub fn new(alphabet: Alphabet, config: TrainConfig) -> Self {
		Self { alphabet, config, abort: None }
	}

	/// Makes the run fail with `Aborted` once `flag` is set.
	pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
		self.abort = Some(flag);
		self
	}

	pub fn alphabet(&self) -> &Alphabet {
		&self.alphabet
	}

	pub fn config(&self) -> &TrainConfig {
		&self.config
	}

	/// Highest order counted and estimated.
	pub fn max_order(&self) -> usize {
		if self.config.quadgrams { 4 } else { 3 }
	}

	/// Fails early if the largest requested tensor exceeds the ceiling.
	pub fn check_capacity(&self) -> Result<()> {
		tensor_cells(&self.alphabet, self.max_order(), &self.config.limits).map(|_| ())
	}

	/// Trains from any source of lines.
	pub fn train<I, S>(&self, lines: I) -> Result<NGramTables>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.check_capacity()?;
		let counts = self.count(lines)?;
		self.estimate(&counts)
	}

	/// Trains from a reader holding one word per line.
	pub fn train_reader<R: BufRead>(&self, reader: R) -> Result<NGramTables> {
		self.check_capacity()?;
		let counts = self.count_reader(reader)?;
		self.estimate(&counts)
	}

	/// Counts n-grams from any source of lines.
	pub fn count<I, S>(&self, lines: I) -> Result<NGramCounts>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.count_lines(lines.into_iter().map(Ok))
	}

	/// Counts n-grams from a reader holding one word per line.
	pub fn count_reader<R: BufRead>(&self, reader: R) -> Result<NGramCounts> {
		self.count_lines(reader.lines().map(|line| line.map_err(NgramError::from)))
	}

	fn count_lines<I, S>(&self, lines: I) -> Result<NGramCounts>
	where
		I: Iterator<Item = Result<S>>,
		S: AsRef<str>,
	{
		let workers = match self.config.jobs {
			0 => num_cpus::get(),
			n => n,
		};
		info!(
			"counting orders 1..={} over {} symbols with {workers} thread(s)",
			self.max_order(),
			self.alphabet.len()
		);
		let counts = if workers <= 1 {
			self.count_sequential(lines)?
		} else {
			self.count_sharded(lines, workers)?
		};
		info!("counted {} words", counts.words());
		Ok(counts)
	}

	fn count_sequential<I, S>(&self, lines: I) -> Result<NGramCounts>
	where
		I: Iterator<Item = Result<S>>,
		S: AsRef<str>,
	{
		let sanitizer = self.sanitizer();
		let mut counts = NGramCounts::new(self.max_order())?;
		for (i, line) in lines.enumerate() {
			self.check_abort()?;
			let line = line?;
			add_line(&mut counts, &sanitizer, &self.alphabet, line.as_ref(), i + 1)?;
			self.log_progress(i + 1);
		}
		Ok(counts)
	}

	fn count_sharded<I, S>(&self, mut lines: I, workers: usize) -> Result<NGramCounts>
	where
		I: Iterator<Item = Result<S>>,
		S: AsRef<str>,
	{
		let batch_lines = self.config.batch_lines.max(workers);
		let mut counts = NGramCounts::new(self.max_order())?;
		let mut first_line = 1;
		loop {
			let mut batch = Vec::with_capacity(batch_lines);
			for line in lines.by_ref().take(batch_lines) {
				self.check_abort()?;
				batch.push(line?.as_ref().to_owned());
			}
			if batch.is_empty() {
				break;
			}
			counts.merge(&self.count_batch(&batch, first_line, workers)?)?;
			first_line += batch.len();
			self.log_progress(first_line - 1);
		}
		Ok(counts)
	}

	/// Counts one batch on `workers` threads, merging in chunk order so the
	/// earliest sanitization error wins.
	fn count_batch(&self, batch: &[String], first_line: usize, workers: usize) -> Result<NGramCounts> {
		let chunk_size = batch.len().div_ceil(workers);
		let max_order = self.max_order();

		let mut partials: Vec<(usize, Result<NGramCounts>)> = thread::scope(|scope| {
			let (tx, rx) = mpsc::channel();
			for (index, chunk) in batch.chunks(chunk_size).enumerate() {
				let tx = tx.clone();
				scope.spawn(move || {
					let sanitizer = self.sanitizer();
					let partial = NGramCounts::new(max_order).and_then(|mut partial| {
						for (offset, line) in chunk.iter().enumerate() {
							self.check_abort()?;
							let line_number = first_line + index * chunk_size + offset;
							add_line(&mut partial, &sanitizer, &self.alphabet, line, line_number)?;
						}
						Ok(partial)
					});
					// rx drains until every sender is dropped, so this cannot fail
					let _ = tx.send((index, partial));
				});
			}
			drop(tx);
			rx.iter().collect()
		});
		partials.sort_by_key(|(index, _)| *index);

		let mut counts = NGramCounts::new(max_order)?;
		for (_, partial) in partials {
			counts.merge(&partial?)?;
		}
		Ok(counts)
	}

	/// Turns counts into tables, in dependency order.
	///
	/// # Errors
	/// - `ShapeMismatch` if `counts` does not track every needed order
	/// - any estimator error
	pub fn estimate(&self, counts: &NGramCounts) -> Result<NGramTables> {
		let limits = &self.config.limits;
		let alphabet = &self.alphabet;

		let unigram = estimate_joint(self.table(counts, 1)?, 1, alphabet, limits)?;

		let bigram_joint = estimate_joint(self.table(counts, 2)?, 2, alphabet, limits)?;
		let bigram = estimate_conditional(bigram_joint.clone(), &unigram)?;

		let trigram_joint = estimate_joint(self.table(counts, 3)?, 3, alphabet, limits)?;
		// the largest joint is always moved into its conditional
		let (trigram, quadgram) = if self.config.quadgrams {
			let trigram = estimate_conditional(trigram_joint.clone(), &bigram_joint)?;
			drop(bigram_joint);
			let quadgram_joint = estimate_joint(self.table(counts, 4)?, 4, alphabet, limits)?;
			(trigram, Some(estimate_conditional(quadgram_joint, &trigram_joint)?))
		} else {
			(estimate_conditional(trigram_joint, &bigram_joint)?, None)
		};

		NGramTables::new(alphabet.clone(), unigram, bigram, trigram, quadgram)
	}

	fn table<'c>(&self, counts: &'c NGramCounts, order: usize) -> Result<&'c CountTable> {
		counts.table(order).ok_or_else(|| NgramError::ShapeMismatch {
			expected: format!("counts up to order {}", self.max_order()),
			actual: format!("counts up to order {}", counts.max_order()),
		})
	}

	fn sanitizer(&self) -> Sanitizer<'_> {
		Sanitizer::new(&self.alphabet, self.config.mode, self.config.fold_case)
	}

	fn check_abort(&self) -> Result<()> {
		match &self.abort {
			Some(flag) if flag.load(Ordering::Relaxed) => Err(NgramError::Aborted),
			_ => Ok(()),
		}
	}

	fn log_progress(&self, lines: usize) {
		let every = self.config.progress_every;
		if every > 0 && lines % every == 0 {
			debug!("{lines} lines counted");
		}
	}
}

fn add_line(
	counts: &mut NGramCounts,
	sanitizer: &Sanitizer,
	alphabet: &Alphabet,
	line: &str,
	line_number: usize,
) -> Result<()> {
	let word = sanitizer.sanitize(line).map_err(|e| e.at_line(line_number))?;
	if !word.is_empty() {
		counts.add_word(&word, alphabet);
	}
	Ok(())
}

/// Trains with default settings.
///
/// The quadgram table is only computed when `compute_quadgrams` is set.
pub fn train<I, S>(lines: I, alphabet: &Alphabet, compute_quadgrams: bool) -> Result<NGramTables>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let config = TrainConfig { quadgrams: compute_quadgrams, ..TrainConfig::default() };
	Trainer::new(alphabet.clone(), config).train(lines)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::tensor::Tensor;
	use std::fs::File;
	use std::io::BufReader;

	const FIXTURE: &str = "testdata/words.txt";

	fn fixture() -> BufReader<File> {
		BufReader::new(File::open(FIXTURE).unwrap())
	}

	fn alnum() -> Alphabet {
		Alphabet::from_kind(AlphabetKind::Alnum)
	}

	fn assert_close(actual: Option<f64>, expected: f64) {
		let actual = actual.unwrap();
		assert!((actual - expected).abs() < 1e-5, "expected {expected}, got {actual}");
	}

	fn assert_proper(conditional: &Tensor) {
		for slice in conditional.slices() {
			let total: f64 = slice.iter().sum();
			assert!((total - 1.0).abs() < 1e-5, "slice sums to {total}");
		}
		assert!(conditional.is_strictly_positive());
	}

	#[test]
	fn it_trains_unigrams() {
		let alphabet = alnum();
		let tables = Trainer::new(alphabet.clone(), TrainConfig::default()).train_reader(fixture()).unwrap();
		assert!((tables.unigram().sum() - 1.0).abs() < 1e-5);
		assert!(tables.unigram().is_strictly_positive());
		assert_close(tables.unigram().lookup(&alphabet, "z"), 0.0);
		assert!(tables.unigram().lookup(&alphabet, "z").unwrap() > 0.0);
	}

	#[test]
	fn it_matches_unigram_frequencies() {
		let alphabet = Alphabet::from_kind(AlphabetKind::Test);
		// 5 a's, 30 b's
		let tables = train(["abbbbbb"; 5], &alphabet, false).unwrap();
		assert_close(tables.unigram().lookup(&alphabet, "a"), 5.0 / 35.0);
		assert_close(tables.unigram().lookup(&alphabet, "b"), 30.0 / 35.0);
		assert_close(tables.unigram().lookup(&alphabet, "c"), 0.0);
	}

	#[test]
	fn it_trains_conditionals() {
		let alphabet = alnum();
		let tables = Trainer::new(alphabet.clone(), TrainConfig::default()).train_reader(fixture()).unwrap();
		assert_close(tables.bigram().lookup(&alphabet, "ll"), 0.25);
		assert_close(tables.trigram().lookup(&alphabet, "ain"), 1.0);
		assert_close(tables.trigram().lookup(&alphabet, "the"), 1.0);
		assert_proper(tables.bigram());
		assert_proper(tables.trigram());
		assert!(tables.quadgram().is_none());
	}

	#[test]
	fn it_trains_quadgrams_on_request() {
		let alphabet = alnum();
		let config = TrainConfig { quadgrams: true, ..TrainConfig::default() };
		let tables = Trainer::new(alphabet.clone(), config).train_reader(fixture()).unwrap();
		let quadgram = tables.quadgram().unwrap();
		assert_eq!(quadgram.shape(), vec![36; 4]);
		assert_close(quadgram.lookup(&alphabet, "rson"), 1.0);
		assert_proper(quadgram);
		assert_eq!(tables.max_order(), 4);
	}

	#[test]
	fn it_leaves_lower_orders_alone_without_quadgrams() {
		let alphabet = alnum();
		let with = Trainer::new(alphabet.clone(), TrainConfig { quadgrams: true, ..TrainConfig::default() })
			.train_reader(fixture())
			.unwrap();
		let trainer = Trainer::new(alphabet, TrainConfig::default());
		let counts = trainer.count_reader(fixture()).unwrap();
		assert!(counts.table(4).is_none());
		let without = trainer.estimate(&counts).unwrap();
		assert!(without.quadgram().is_none());
		assert_eq!(with.unigram(), without.unigram());
		assert_eq!(with.bigram(), without.bigram());
		assert_eq!(with.trigram(), without.trigram());
	}

	#[test]
	fn it_reports_the_offending_line_in_strict_mode() {
		let config = TrainConfig { mode: SanitizeMode::Strict, ..TrainConfig::default() };
		let err = Trainer::new(alnum(), config).train_reader(fixture()).unwrap_err();
		assert!(matches!(err, NgramError::OutOfAlphabet { character: ',', line: Some(6) }));
	}

	#[test]
	fn it_checks_capacity_before_reading() {
		let config = TrainConfig {
			quadgrams: true,
			limits: CapacityLimits { max_cells: 1 << 20, warn_cells: 1 << 10 },
			..TrainConfig::default()
		};
		let trainer = Trainer::new(Alphabet::from_kind(AlphabetKind::Extended), config);
		let corpus = std::iter::from_fn(|| -> Option<&'static str> { panic!("corpus must not be read") });
		let err = trainer.train(corpus).unwrap_err();
		assert!(matches!(err, NgramError::CapacityExceeded { order: 4, .. }));
	}

	#[test]
	fn it_stops_when_aborted() {
		let flag = Arc::new(AtomicBool::new(true));
		let trainer = Trainer::new(alnum(), TrainConfig::default()).with_abort_flag(Arc::clone(&flag));
		assert!(matches!(trainer.train_reader(fixture()), Err(NgramError::Aborted)));

		flag.store(false, Ordering::Relaxed);
		assert!(trainer.train_reader(fixture()).is_ok());
	}

	#[test]
	fn it_counts_the_same_on_several_threads() {
		let alphabet = alnum();
		let sequential = Trainer::new(alphabet.clone(), TrainConfig::default()).count_reader(fixture()).unwrap();
		let sharded = Trainer::new(alphabet, TrainConfig { jobs: 3, batch_lines: 4, ..TrainConfig::default() })
			.count_reader(fixture())
			.unwrap();
		assert_eq!(sharded, sequential);
		assert_eq!(sharded.words(), 11);
	}

	#[test]
	fn it_reports_the_first_bad_line_on_several_threads() {
		let strict = TrainConfig { mode: SanitizeMode::Strict, jobs: 2, ..TrainConfig::default() };

		let config = TrainConfig { batch_lines: 4, ..strict.clone() };
		let err = Trainer::new(alnum(), config).count(["ok", "fine", "a!", "b?", "good", "c#"]).unwrap_err();
		assert!(matches!(err, NgramError::OutOfAlphabet { character: '!', line: Some(3) }));

		let config = TrainConfig { batch_lines: 2, ..strict };
		let err = Trainer::new(alnum(), config).count(["ok", "fine", "good", "bad!"]).unwrap_err();
		assert!(matches!(err, NgramError::OutOfAlphabet { character: '!', line: Some(4) }));
	}

	#[test]
	fn it_skips_blank_lines() {
		let trainer = Trainer::new(alnum(), TrainConfig::default());
		let counts = trainer.count(["", "  ", "ab", "!!"]).unwrap();
		assert_eq!(counts.words(), 1);
		assert_eq!(counts.total(1), 2);
	}

	#[test]
	fn it_uses_the_case_folding_of_the_alphabet() {
		let extended = Alphabet::from_kind(AlphabetKind::Extended);
		let config = TrainConfig::for_kind(AlphabetKind::Extended);
		assert!(!config.fold_case);
		let tables = Trainer::new(extended.clone(), config).train(["Aa", "AA"]).unwrap();
		assert_close(tables.unigram().lookup(&extended, "A"), 0.75);
		assert_close(tables.bigram().lookup(&extended, "AA"), 0.5);
	}

	#[test]
	fn it_trains_on_accented_words() {
		let alphabet = Alphabet::from_kind(AlphabetKind::Diacritics);
		let config = TrainConfig { quadgrams: true, ..TrainConfig::for_kind(AlphabetKind::Diacritics) };
		let words = ["café", "École", "élève", "naïve", "œuvre", "straße", "Über", "garçon", "año", "crème"];
		let tables = Trainer::new(alphabet.clone(), config).train(words).unwrap();

		assert!((tables.unigram().sum() - 1.0).abs() < 1e-5);
		assert!(tables.unigram().is_strictly_positive());
		// 3 é among 48 symbols, École folded
		assert_close(tables.unigram().lookup(&alphabet, "é"), 3.0 / 48.0);
		assert_close(tables.unigram().lookup(&alphabet, "ü"), 1.0 / 48.0);
		assert_close(tables.trigram().lookup(&alphabet, "çon"), 1.0);
		assert_close(tables.quadgram().unwrap().lookup(&alphabet, "œuvr"), 1.0);
		assert_proper(tables.bigram());
		assert_proper(tables.trigram());
		assert_proper(tables.quadgram().unwrap());
	}
}
