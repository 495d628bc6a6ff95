use std::fmt;

use serde::{Deserialize, Serialize};

use super::tensor::Tensor;
use crate::alphabet::{Alphabet, SymbolId};
use crate::error::{NgramError, Result};

/// Result of a training run: the alphabet and one probability table per
/// order.
///
/// - `unigram`: `p(s)`, shape `[A]`
/// - `bigram`: `p(s | s1)`, shape `[A, A]`
/// - `trigram`: `p(s | s1, s2)`, shape `[A, A, A]`
/// - `quadgram`: `p(s | s1, s2, s3)`, shape `[A, A, A, A]`, only when requested
///
/// Field names and shapes are what downstream consumers read back, so they
/// are part of the persisted format.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NGramTables {
	alphabet: Alphabet,
	unigram: Tensor,
	bigram: Tensor,
	trigram: Tensor,
	quadgram: Option<Tensor>,
}

impl NGramTables {
	/// Assembles tables and checks their shapes against the alphabet.
	///
	/// # Errors
	/// Returns `ShapeMismatch` if a table has the wrong order or size.
	pub fn new(
		alphabet: Alphabet,
		unigram: Tensor,
		bigram: Tensor,
		trigram: Tensor,
		quadgram: Option<Tensor>,
	) -> Result<Self> {
		let tables = Self { alphabet, unigram, bigram, trigram, quadgram };
		tables.validate()?;
		Ok(tables)
	}

	/// Checks every table against the alphabet size and its expected order.
	///
	/// Used after loading, where the bytes come from outside.
	pub fn validate(&self) -> Result<()> {
		for (order, tensor) in self.orders() {
			tensor.check_shape()?;
			if tensor.order() != order || tensor.size() != self.alphabet.len() {
				return Err(NgramError::ShapeMismatch {
					expected: format!("order-{order} table over {} symbols", self.alphabet.len()),
					actual: format!("order-{} table over {} symbols", tensor.order(), tensor.size()),
				});
			}
		}
		Ok(())
	}

	pub fn alphabet(&self) -> &Alphabet {
		&self.alphabet
	}

	pub fn unigram(&self) -> &Tensor {
		&self.unigram
	}

	pub fn bigram(&self) -> &Tensor {
		&self.bigram
	}

	pub fn trigram(&self) -> &Tensor {
		&self.trigram
	}

	pub fn quadgram(&self) -> Option<&Tensor> {
		self.quadgram.as_ref()
	}

	/// Highest order available (3 or 4).
	pub fn max_order(&self) -> usize {
		if self.quadgram.is_some() { 4 } else { 3 }
	}

	/// Table of a given order, `None` if absent.
	pub fn table(&self, order: usize) -> Option<&Tensor> {
		match order {
			1 => Some(&self.unigram),
			2 => Some(&self.bigram),
			3 => Some(&self.trigram),
			4 => self.quadgram.as_ref(),
			_ => None,
		}
	}

	fn orders(&self) -> impl Iterator<Item = (usize, &Tensor)> {
		(1..=4).filter_map(|order| self.table(order).map(|tensor| (order, tensor)))
	}

	/// `p(symbol | context)` using the longest usable suffix of `context`.
	///
	/// # Panics
	/// Panics if an id is outside the alphabet.
	pub fn probability(&self, context: &[SymbolId], symbol: SymbolId) -> f64 {
		let used = context.len().min(self.max_order() - 1);
		let mut ngram = context[context.len() - used..].to_vec();
		ngram.push(symbol);
		match self.table(ngram.len()) {
			Some(table) => table.get(&ngram),
			None => self.unigram.get(&[symbol]),
		}
	}

	/// Natural-log probability of a whole symbol string under the chained
	/// model: the first symbol is scored by the unigram table, the next by
	/// the bigram table, and so on up to `max_order`.
	///
	/// Returns `None` if a character is not in the alphabet.
	pub fn log_probability(&self, text: &str) -> Option<f64> {
		let ids: Option<Vec<SymbolId>> = text.chars().map(|c| self.alphabet.index_of(c)).collect();
		let ids = ids?;
		Some((0..ids.len()).map(|i| self.probability(&ids[..i], ids[i]).ln()).sum())
	}
}

impl fmt::Display for NGramTables {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let shape = |tensor: &Tensor| tensor.shape().iter().map(usize::to_string).collect::<Vec<_>>().join("x");
		write!(
			f,
			"{} symbols, unigram {}, bigram {}, trigram {}",
			self.alphabet.len(),
			shape(&self.unigram),
			shape(&self.bigram),
			shape(&self.trigram)
		)?;
		if let Some(quadgram) = &self.quadgram {
			write!(f, ", quadgram {}", shape(quadgram))?;
		}
		Ok(())
	}
}
