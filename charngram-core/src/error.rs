use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or loading n-gram tables.
///
/// Every variant is terminal for a training run: nothing is retried and
/// partial tables are never returned.
#[derive(Error, Debug)]
pub enum NgramError {
	/// The alphabet selector does not name a known alphabet.
	#[error("unsupported alphabet '{0}' (expected one of: alnum, test, extended, diacritics)")]
	UnsupportedAlphabet(String),

	/// A custom alphabet is empty, too large, or contains duplicates.
	#[error("invalid alphabet: {0}")]
	InvalidAlphabet(String),

	/// Strict sanitization met a character outside the alphabet.
	#[error("character {character:?} is not in the alphabet{}", .line.map(|l| format!(" (line {l})")).unwrap_or_default())]
	OutOfAlphabet { character: char, line: Option<usize> },

	/// A dense tensor for `order` would exceed the configured cell ceiling.
	#[error("order-{order} tensor needs {cells} cells, limit is {limit}")]
	CapacityExceeded { order: usize, cells: u64, limit: u64 },

	/// N-gram order outside 1..=4.
	#[error("n-gram order must be between 1 and {max}, got {0}", max = crate::MAX_ORDER)]
	InvalidOrder(usize),

	/// Two tensors that must line up do not.
	#[error("shape mismatch: expected {expected}, got {actual}")]
	ShapeMismatch { expected: String, actual: String },

	/// The cooperative abort flag was raised during the corpus pass.
	#[error("training aborted")]
	Aborted,

	/// Refusing to overwrite an existing file.
	#[error("output file already exists: {}", .0.display())]
	OutputExists(PathBuf),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] postcard::Error),
}

impl NgramError {
	/// Attaches a 1-based line number to an `OutOfAlphabet` error.
	///
	/// Other variants are returned unchanged.
	pub fn at_line(self, line_number: usize) -> Self {
		match self {
			NgramError::OutOfAlphabet { character, line: None } => NgramError::OutOfAlphabet {
				character,
				line: Some(line_number),
			},
			other => other,
		}
	}
}

pub type Result<T> = std::result::Result<T, NgramError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn it_reports_the_offending_line() {
		let err = NgramError::OutOfAlphabet { character: '%', line: None }.at_line(12);
		assert_eq!(err.to_string(), "character '%' is not in the alphabet (line 12)");
	}

	#[test]
	fn it_keeps_an_existing_line() {
		let err = NgramError::OutOfAlphabet { character: '%', line: Some(3) }.at_line(12);
		assert!(matches!(err, NgramError::OutOfAlphabet { line: Some(3), .. }));
	}

	#[test]
	fn it_leaves_other_errors_alone() {
		let err = NgramError::Aborted.at_line(4);
		assert!(matches!(err, NgramError::Aborted));
	}
}
