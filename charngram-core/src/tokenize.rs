//! Raw text to one-word-per-line corpus conversion.

use std::io::{BufRead, Write};
use std::path::Path;

use log::info;

use crate::error::Result;
use crate::io::{create_new, open_corpus};

/// Splits a line of free text into tokens.
///
/// Splits on whitespace, then peels punctuation off both ends of each chunk,
/// one token per punctuation character. Punctuation inside a chunk
/// (`don't`, `well-known`) stays in place.
pub fn tokenize_line(line: &str) -> Vec<&str> {
	let mut tokens = Vec::new();
	for chunk in line.split_whitespace() {
		let core_start = chunk.find(|c: char| !c.is_ascii_punctuation()).unwrap_or(chunk.len());
		let core_end = chunk
			.rfind(|c: char| !c.is_ascii_punctuation())
			.map(|i| i + chunk[i..].chars().next().map_or(1, char::len_utf8))
			.unwrap_or(core_start);

		let (head, rest) = chunk.split_at(core_start);
		let (core, tail) = rest.split_at(core_end - core_start);
		tokens.extend(head.char_indices().map(|(i, c)| &head[i..i + c.len_utf8()]));
		if !core.is_empty() {
			tokens.push(core);
		}
		tokens.extend(tail.char_indices().map(|(i, c)| &tail[i..i + c.len_utf8()]));
	}
	tokens
}

/// Tokenizes `input` into `output`, one token per line.
///
/// Returns the number of tokens written.
///
/// # Errors
/// Returns `OutputExists` if `output` already exists.
pub fn tokenize_file<PI, PO>(input: PI, output: PO) -> Result<usize>
where
	PI: AsRef<Path>,
	PO: AsRef<Path>,
{
	let reader = open_corpus(&input)?;
	let mut writer = create_new(&output)?;
	let mut written = 0;
	for line in reader.lines() {
		for token in tokenize_line(&line?) {
			writeln!(writer, "{token}")?;
			written += 1;
		}
	}
	writer.flush()?;
	info!("read {written} words, wrote {}", output.as_ref().display());
	Ok(written)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::NgramError;
	use std::fs;

	#[test]
	fn it_splits_words_and_punctuation() {
		assert_eq!(
			tokenize_line("  \"Hello,\" she said (twice)... "),
			vec!["\"", "Hello", ",", "\"", "she", "said", "(", "twice", ")", ".", ".", "."]
		);
	}

	#[test]
	fn it_keeps_inner_punctuation() {
		assert_eq!(tokenize_line("don't stop well-known"), vec!["don't", "stop", "well-known"]);
	}

	#[test]
	fn it_handles_pure_punctuation_and_unicode() {
		assert_eq!(tokenize_line("?! école."), vec!["?", "!", "école", "."]);
		assert!(tokenize_line("   ").is_empty());
	}

	#[test]
	fn it_tokenizes_files_once() {
		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("raw.txt");
		let output = dir.path().join("words.txt");
		fs::write(&input, "The rain, again.\nPerson\n").unwrap();

		assert_eq!(tokenize_file(&input, &output).unwrap(), 6);
		assert_eq!(fs::read_to_string(&output).unwrap(), "The\nrain\n,\nagain\n.\nPerson\n");

		let err = tokenize_file(&input, &output).unwrap_err();
		assert!(matches!(err, NgramError::OutputExists(_)));
	}
}
