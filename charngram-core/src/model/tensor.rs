use serde::{Deserialize, Serialize};

use crate::alphabet::{Alphabet, SymbolId};
use crate::error::{NgramError, Result};

/// Dense `size^order` array of probabilities, stored row-major.
///
/// Axis `j` of the tensor is the `j`-th symbol of an n-gram, so the offset of
/// an n-gram is its flat key over the alphabet and the last axis is
/// contiguous. A "slice" is the run of `size` cells sharing a prefix.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Tensor {
	size: usize,
	order: usize,
	data: Vec<f64>,
}

impl Tensor {
	/// Wraps raw cells.
	///
	/// # Errors
	/// Returns `ShapeMismatch` if `data.len() != size^order`.
	pub fn from_vec(size: usize, order: usize, data: Vec<f64>) -> Result<Self> {
		let tensor = Self { size, order, data };
		tensor.check_shape()?;
		Ok(tensor)
	}

	/// Verifies that the cell count matches the declared shape.
	pub fn check_shape(&self) -> Result<()> {
		let expected = u32::try_from(self.order).ok().and_then(|order| self.size.checked_pow(order));
		if expected != Some(self.data.len()) {
			return Err(NgramError::ShapeMismatch {
				expected: format!("{}^{} cells", self.size, self.order),
				actual: format!("{} cells", self.data.len()),
			});
		}
		Ok(())
	}

	/// Alphabet size along every axis.
	pub fn size(&self) -> usize {
		self.size
	}

	pub fn order(&self) -> usize {
		self.order
	}

	pub fn shape(&self) -> Vec<usize> {
		vec![self.size; self.order]
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn as_slice(&self) -> &[f64] {
		&self.data
	}

	/// Offset of an n-gram in `data`.
	///
	/// # Panics
	/// Panics if `ngram.len() != order` or an id is out of range.
	fn offset(&self, ngram: &[SymbolId]) -> usize {
		assert_eq!(ngram.len(), self.order, "n-gram length does not match tensor order");
		ngram.iter().fold(0, |offset, id| {
			assert!(*id < self.size, "symbol id {id} out of range");
			offset * self.size + id
		})
	}

	/// Value of an n-gram given as symbol ids.
	///
	/// # Panics
	/// Panics if the n-gram does not fit the tensor shape.
	pub fn get(&self, ngram: &[SymbolId]) -> f64 {
		self.data[self.offset(ngram)]
	}

	/// Value of an n-gram spelled as text, `None` if any character is not in
	/// the alphabet or the length does not match the order.
	///
	/// For a conditional tensor, `lookup(a, "the")` is `p(e | t, h)`.
	pub fn lookup(&self, alphabet: &Alphabet, ngram: &str) -> Option<f64> {
		let ids: Option<Vec<SymbolId>> = ngram.chars().map(|c| alphabet.index_of(c)).collect();
		let ids = ids?;
		if ids.len() != self.order || alphabet.len() != self.size {
			return None;
		}
		Some(self.get(&ids))
	}

	/// Trailing-axis slice for a prefix of `order - 1` symbols.
	///
	/// # Panics
	/// Panics if the prefix does not fit the tensor shape.
	pub fn slice(&self, prefix: &[SymbolId]) -> &[f64] {
		assert_eq!(prefix.len() + 1, self.order, "prefix length must be order - 1");
		let start = prefix.iter().fold(0, |offset, id| {
			assert!(*id < self.size, "symbol id {id} out of range");
			offset * self.size + id
		}) * self.size;
		&self.data[start..start + self.size]
	}

	/// Iterates over every trailing-axis slice in prefix order.
	pub fn slices(&self) -> impl Iterator<Item = &[f64]> {
		self.data.chunks(self.size.max(1))
	}

	pub(crate) fn slices_mut(&mut self) -> impl Iterator<Item = &mut [f64]> {
		self.data.chunks_mut(self.size.max(1))
	}

	pub fn sum(&self) -> f64 {
		self.data.iter().sum()
	}

	/// True if every cell is finite and > 0.
	pub fn is_strictly_positive(&self) -> bool {
		self.data.iter().all(|p| p.is_finite() && *p > 0.0)
	}

	/// Natural log of every cell, for scoring in the log domain.
	pub fn ln(&self) -> Vec<f64> {
		self.data.iter().map(|p| p.ln()).collect()
	}
}
