use crate::alphabet::{Alphabet, SymbolId};
use crate::error::{NgramError, Result};

/// What to do with a character that is not in the alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SanitizeMode {
	/// Drop the character and keep going.
	#[default]
	Lenient,
	/// Fail with `OutOfAlphabet`.
	Strict,
}

/// Turns raw corpus lines into symbol id sequences.
///
/// # Notes
/// - Surrounding whitespace is trimmed before anything else.
/// - With `fold_case`, each character is lowercased first; a character may
///   lowercase to several (`'İ'`), each is then checked on its own.
#[derive(Debug, Clone)]
pub struct Sanitizer<'a> {
	alphabet: &'a Alphabet,
	mode: SanitizeMode,
	fold_case: bool,
}

impl<'a> Sanitizer<'a> {
	pub fn new(alphabet: &'a Alphabet, mode: SanitizeMode, fold_case: bool) -> Self {
		Self { alphabet, mode, fold_case }
	}

	pub fn mode(&self) -> SanitizeMode {
		self.mode
	}

	/// Sanitizes one line.
	///
	/// # Errors
	/// In `Strict` mode, returns `OutOfAlphabet` for the first character not
	/// in the alphabet. The error carries no line number; the caller adds it.
	pub fn sanitize(&self, raw_line: &str) -> Result<Vec<SymbolId>> {
		let mut word = Vec::with_capacity(raw_line.len());
		for c in raw_line.trim().chars() {
			if self.fold_case {
				for lower in c.to_lowercase() {
					self.push(&mut word, lower)?;
				}
			} else {
				self.push(&mut word, c)?;
			}
		}
		Ok(word)
	}

	fn push(&self, word: &mut Vec<SymbolId>, c: char) -> Result<()> {
		match self.alphabet.index_of(c) {
			Some(id) => word.push(id),
			None if self.mode == SanitizeMode::Strict => {
				return Err(NgramError::OutOfAlphabet { character: c, line: None });
			}
			None => (),
		}
		Ok(())
	}
}
