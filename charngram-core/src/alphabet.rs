use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NgramError, Result};

/// Position of a symbol inside its alphabet.
pub type SymbolId = usize;

/// An n-gram packed into its row-major flat index over the alphabet.
///
/// For a tuple `(i_0, .., i_{k-1})` the key is `Σ i_j · A^(k-1-j)`, which is
/// also the offset of that tuple inside a dense `A^k` tensor.
pub type NGramKey = u64;

const DIGITS: &str = "0123456789";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const PUNCTUATION: &str = " !\"#&'()*+,-./:;?";
const ACCENTED: &str = "àáâãäåæçèéêëìíîïñòóôõöøùúûüýÿœß";

/// Named alphabets selectable from configuration.
///
/// # Variants
/// - `Alnum`: digits then lowercase letters (36 symbols).
/// - `Test`: `a`, `b`, `c`, for fixtures.
/// - `Extended`: lower and upper case letters, digits and punctuation.
/// - `Diacritics`: `Alnum` followed by accented lowercase letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphabetKind {
	Alnum,
	Test,
	Extended,
	Diacritics,
}

impl AlphabetKind {
	pub const ALL: [AlphabetKind; 4] = [
		AlphabetKind::Alnum,
		AlphabetKind::Test,
		AlphabetKind::Extended,
		AlphabetKind::Diacritics,
	];

	/// Selector name, as accepted by `from_str`.
	pub fn name(&self) -> &'static str {
		match self {
			AlphabetKind::Alnum => "alnum",
			AlphabetKind::Test => "test",
			AlphabetKind::Extended => "extended",
			AlphabetKind::Diacritics => "diacritics",
		}
	}

	/// Whether input is lowercased before lookup by default.
	///
	/// Only `Extended` carries upper case symbols, so it is the only kind
	/// that preserves case.
	pub fn folds_case(&self) -> bool {
		!matches!(self, AlphabetKind::Extended)
	}

	fn symbols(&self) -> Vec<char> {
		let parts: &[&str] = match self {
			AlphabetKind::Alnum => &[DIGITS, LOWERCASE],
			AlphabetKind::Test => &["abc"],
			AlphabetKind::Extended => &[LOWERCASE, UPPERCASE, DIGITS, PUNCTUATION],
			AlphabetKind::Diacritics => &[DIGITS, LOWERCASE, ACCENTED],
		};
		parts.iter().flat_map(|part| part.chars()).collect()
	}
}

impl FromStr for AlphabetKind {
	type Err = NgramError;

	fn from_str(s: &str) -> Result<Self> {
		let wanted = s.trim().to_lowercase();
		AlphabetKind::ALL
			.into_iter()
			.find(|kind| kind.name() == wanted)
			.ok_or_else(|| NgramError::UnsupportedAlphabet(s.to_owned()))
	}
}

impl fmt::Display for AlphabetKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Ordered set of symbols defining the index space of every table.
///
/// The order of `symbols` is the index mapping used by all dense tensors, so
/// an alphabet is persisted next to the tables computed with it.
///
/// # Invariants
/// - At least one symbol, no duplicates
/// - At most `u16::MAX` symbols, so an order-4 key always fits an `NGramKey`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "Vec<char>", into = "Vec<char>")]
pub struct Alphabet {
	symbols: Vec<char>,
	index: HashMap<char, SymbolId>,
}

impl Alphabet {
	/// Builds a custom alphabet from an ordered symbol list.
	///
	/// # Errors
	/// Returns `InvalidAlphabet` if the list is empty, too large or
	/// contains the same symbol twice.
	pub fn new(symbols: Vec<char>) -> Result<Self> {
		if symbols.is_empty() {
			return Err(NgramError::InvalidAlphabet("no symbols".to_owned()));
		}
		if symbols.len() > u16::MAX as usize {
			return Err(NgramError::InvalidAlphabet(format!(
				"{} symbols, at most {} allowed",
				symbols.len(),
				u16::MAX
			)));
		}
		let alphabet = Self::build(symbols);
		if alphabet.index.len() != alphabet.symbols.len() {
			return Err(NgramError::InvalidAlphabet("duplicate symbols".to_owned()));
		}
		Ok(alphabet)
	}

	/// Returns one of the built-in alphabets.
	pub fn from_kind(kind: AlphabetKind) -> Self {
		Self::build(kind.symbols())
	}

	fn build(symbols: Vec<char>) -> Self {
		let index = symbols.iter().enumerate().map(|(i, c)| (*c, i)).collect();
		Self { symbols, index }
	}

	/// Number of symbols (`A`).
	pub fn len(&self) -> usize {
		self.symbols.len()
	}

	pub fn is_empty(&self) -> bool {
		self.symbols.is_empty()
	}

	pub fn symbols(&self) -> &[char] {
		&self.symbols
	}

	pub fn index_of(&self, c: char) -> Option<SymbolId> {
		self.index.get(&c).copied()
	}

	pub fn symbol(&self, id: SymbolId) -> Option<char> {
		self.symbols.get(id).copied()
	}

	pub fn contains(&self, c: char) -> bool {
		self.index.contains_key(&c)
	}

	/// Number of cells of a dense tensor of the given order (`A^order`).
	///
	/// Returns `None` on overflow.
	pub fn cells(&self, order: usize) -> Option<u64> {
		let exponent = u32::try_from(order).ok()?;
		(self.len() as u64).checked_pow(exponent)
	}

	/// Packs a tuple of symbol ids into its flat key.
	pub fn flat_index(&self, ngram: &[SymbolId]) -> NGramKey {
		let size = self.len() as u64;
		ngram.iter().fold(0, |key, id| key * size + *id as u64)
	}

	/// Decodes a flat key back into its `order` symbol ids.
	pub fn unflatten(&self, mut key: NGramKey, order: usize) -> Vec<SymbolId> {
		let size = self.len() as u64;
		let mut ngram = vec![0; order];
		for slot in ngram.iter_mut().rev() {
			*slot = (key % size) as SymbolId;
			key /= size;
		}
		ngram
	}

	/// Renders symbol ids as a string, skipping unknown ids.
	pub fn render(&self, ngram: &[SymbolId]) -> String {
		ngram.iter().filter_map(|id| self.symbol(*id)).collect()
	}
}

impl TryFrom<Vec<char>> for Alphabet {
	type Error = NgramError;

	fn try_from(symbols: Vec<char>) -> Result<Self> {
		Alphabet::new(symbols)
	}
}

impl From<Alphabet> for Vec<char> {
	fn from(alphabet: Alphabet) -> Self {
		alphabet.symbols
	}
}
