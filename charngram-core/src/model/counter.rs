use std::collections::HashMap;

use crate::alphabet::{Alphabet, NGramKey, SymbolId};
use crate::error::{NgramError, Result};
use crate::MAX_ORDER;

/// Sparse occurrence counts for a single order.
pub type CountTable = HashMap<NGramKey, u64>;

/// Counts the n-grams of width `order` in a single word.
///
/// Slides a window of `order` symbols over the word. A word shorter than
/// `order` yields an empty table.
pub fn count_ngrams(word: &[SymbolId], order: usize, alphabet: &Alphabet) -> CountTable {
	let mut table = CountTable::new();
	add_windows(&mut table, word, order, alphabet);
	table
}

fn add_windows(table: &mut CountTable, word: &[SymbolId], order: usize, alphabet: &Alphabet) {
	if order == 0 {
		return;
	}
	for window in word.windows(order) {
		*table.entry(alphabet.flat_index(window)).or_insert(0) += 1;
	}
}

/// Raw n-gram counts for orders `1..=max_order`, accumulated over a corpus.
///
/// # Responsibilities
/// - Accumulate window counts for every sanitized word
/// - Merge with partial counts built elsewhere (ex. on another thread)
///
/// # Invariants
/// - `tables[k - 1]` holds order-`k` counts, keys are flat indices over the
///   alphabet the words were sanitized with
/// - Every stored count is >= 1
///
/// Accumulation is additive, so the final table does not depend on the order
/// in which words are added or partial tables merged.
#[derive(Clone, Debug, PartialEq)]
pub struct NGramCounts {
	max_order: usize,
	tables: Vec<CountTable>,
	words: u64,
}

impl NGramCounts {
	/// Creates empty counts for orders `1..=max_order`.
	///
	/// # Errors
	/// Returns `InvalidOrder` if `max_order` is outside `1..=4`.
	pub fn new(max_order: usize) -> Result<Self> {
		if !(1..=MAX_ORDER).contains(&max_order) {
			return Err(NgramError::InvalidOrder(max_order));
		}
		Ok(Self { max_order, tables: vec![CountTable::new(); max_order], words: 0 })
	}

	pub fn max_order(&self) -> usize {
		self.max_order
	}

	/// Number of words added, including those too short for some orders.
	pub fn words(&self) -> u64 {
		self.words
	}

	/// Adds every n-gram of `word` for all tracked orders.
	pub fn add_word(&mut self, word: &[SymbolId], alphabet: &Alphabet) {
		self.words += 1;
		for (i, table) in self.tables.iter_mut().enumerate() {
			add_windows(table, word, i + 1, alphabet);
		}
	}

	/// Merges another set of counts into this one.
	///
	/// # Errors
	/// Returns `ShapeMismatch` if the two do not track the same orders.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.max_order != other.max_order {
			return Err(NgramError::ShapeMismatch {
				expected: format!("counts up to order {}", self.max_order),
				actual: format!("counts up to order {}", other.max_order),
			});
		}
		for (table, other_table) in self.tables.iter_mut().zip(&other.tables) {
			for (key, count) in other_table {
				*table.entry(*key).or_insert(0) += *count;
			}
		}
		self.words += other.words;
		Ok(())
	}

	/// Sparse table for `order`, or `None` if that order is not tracked.
	pub fn table(&self, order: usize) -> Option<&CountTable> {
		order.checked_sub(1).and_then(|i| self.tables.get(i))
	}

	/// Observed count of a specific n-gram, 0 if absent or untracked.
	pub fn count(&self, ngram: &[SymbolId], alphabet: &Alphabet) -> u64 {
		self.table(ngram.len())
			.and_then(|table| table.get(&alphabet.flat_index(ngram)))
			.copied()
			.unwrap_or(0)
	}

	/// Sum of all counts of an order.
	pub fn total(&self, order: usize) -> u64 {
		self.table(order).map(|table| table.values().sum()).unwrap_or(0)
	}

	/// Number of distinct n-grams seen for an order.
	pub fn distinct(&self, order: usize) -> usize {
		self.table(order).map(HashMap::len).unwrap_or(0)
	}
}
