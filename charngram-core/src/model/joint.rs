use log::{info, warn};

use super::counter::CountTable;
use super::tensor::Tensor;
use crate::alphabet::Alphabet;
use crate::error::{NgramError, Result};
use crate::MAX_ORDER;

/// Value written in place of a zero count.
///
/// Smallest positive normal `f64`: keeps `ln` finite and keeps every marginal
/// used as a divisor in the conditional step away from zero.
pub const PROBABILITY_FLOOR: f64 = f64::MIN_POSITIVE;

/// Ceilings on dense tensor sizes, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityLimits {
	/// Above this, estimation fails with `CapacityExceeded` before allocating.
	pub max_cells: u64,
	/// Above this, a warning is logged.
	pub warn_cells: u64,
}

impl Default for CapacityLimits {
	fn default() -> Self {
		Self { max_cells: 1 << 28, warn_cells: 1 << 24 }
	}
}

/// Number of cells of an order-`order` tensor over `alphabet`, if it fits
/// the limits. Logs nothing.
///
/// # Errors
/// - `InvalidOrder` if `order` is outside `1..=4`
/// - `CapacityExceeded` if `A^order` overflows or exceeds `max_cells`
pub fn tensor_cells(alphabet: &Alphabet, order: usize, limits: &CapacityLimits) -> Result<usize> {
	if !(1..=MAX_ORDER).contains(&order) {
		return Err(NgramError::InvalidOrder(order));
	}
	let cells = alphabet.cells(order).unwrap_or(u64::MAX);
	if cells > limits.max_cells {
		return Err(NgramError::CapacityExceeded { order, cells, limit: limits.max_cells });
	}
	usize::try_from(cells).map_err(|_| NgramError::CapacityExceeded { order, cells, limit: limits.max_cells })
}

/// Same as [`tensor_cells`], warning when the tensor is above `warn_cells`.
pub fn check_capacity(alphabet: &Alphabet, order: usize, limits: &CapacityLimits) -> Result<usize> {
	let cells = tensor_cells(alphabet, order, limits)?;
	if cells as u64 > limits.warn_cells {
		warn!(
			"order-{order} tensor over {} symbols needs {cells} cells ({} MiB)",
			alphabet.len(),
			mebibytes(cells as u64)
		);
	}
	Ok(cells)
}

fn mebibytes(cells: u64) -> u64 {
	cells.saturating_mul(size_of::<f64>() as u64) / (1 << 20)
}

/// Turns raw order-`order` counts into a dense joint probability tensor.
///
/// Every one of the `A^order` cells is materialized: observed counts are
/// written at their flat key, zero cells are replaced by
/// [`PROBABILITY_FLOOR`], then the whole tensor is divided by its sum.
///
/// # Errors
/// - `InvalidOrder` / `CapacityExceeded` from [`check_capacity`], raised
///   before anything is allocated
/// - `ShapeMismatch` if a key does not fit the alphabet (counts built with
///   another alphabet)
pub fn estimate_joint(
	counts: &CountTable,
	order: usize,
	alphabet: &Alphabet,
	limits: &CapacityLimits,
) -> Result<Tensor> {
	let cells = check_capacity(alphabet, order, limits)?;
	info!("order-{order} joint: {} observed of {cells} cells", counts.len());

	let mut data = vec![0.0; cells];
	for (key, count) in counts {
		let index = usize::try_from(*key)
			.ok()
			.filter(|i| *i < cells)
			.ok_or_else(|| NgramError::ShapeMismatch {
				expected: format!("key below {cells}"),
				actual: format!("key {key}"),
			})?;
		data[index] = *count as f64;
	}

	floor_zeros(&mut data);
	let total: f64 = data.iter().sum();
	for cell in data.iter_mut() {
		*cell /= total;
	}
	floor_zeros(&mut data);

	Tensor::from_vec(alphabet.len(), order, data)
}

/// Replaces exact zeros with [`PROBABILITY_FLOOR`].
pub(crate) fn floor_zeros(cells: &mut [f64]) {
	for cell in cells.iter_mut().filter(|cell| **cell == 0.0) {
		*cell = PROBABILITY_FLOOR;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::alphabet::AlphabetKind;
	use crate::model::counter::NGramCounts;

	fn counts_for(alphabet: &Alphabet, words: &[&str], max_order: usize) -> NGramCounts {
		let mut counts = NGramCounts::new(max_order).unwrap();
		for word in words {
			let ids: Vec<_> = word.chars().filter_map(|c| alphabet.index_of(c)).collect();
			counts.add_word(&ids, alphabet);
		}
		counts
	}

	#[test]
	fn it_normalizes_unigrams() {
		let alphabet = Alphabet::from_kind(AlphabetKind::Test);
		// 5 a's out of 35 symbols
		let counts = counts_for(&alphabet, &["abbbbbb"; 5], 1);
		let joint = estimate_joint(counts.table(1).unwrap(), 1, &alphabet, &CapacityLimits::default()).unwrap();
		assert!((joint.sum() - 1.0).abs() < 1e-5);
		assert!((joint.get(&[0]) - 5.0 / 35.0).abs() < 1e-5);
		assert!((joint.get(&[1]) - 30.0 / 35.0).abs() < 1e-5);
		assert!(joint.get(&[2]) > 0.0);
		assert!(joint.get(&[2]) < 1e-5);
	}

	#[test]
	fn it_visits_every_axis_independently() {
		let alphabet = Alphabet::from_kind(AlphabetKind::Test);
		let counts = counts_for(&alphabet, &["ab", "ab", "ca"], 2);
		let joint = estimate_joint(counts.table(2).unwrap(), 2, &alphabet, &CapacityLimits::default()).unwrap();
		assert!((joint.get(&[0, 1]) - 2.0 / 3.0).abs() < 1e-9);
		assert!((joint.get(&[2, 0]) - 1.0 / 3.0).abs() < 1e-9);
		// diagonal cells were never observed
		assert!(joint.get(&[0, 0]) < 1e-300);
		assert!(joint.get(&[1, 1]) < 1e-300);
	}

	#[test]
	fn it_never_writes_zero() {
		let alphabet = Alphabet::from_kind(AlphabetKind::Alnum);
		let counts = counts_for(&alphabet, &["the", "then", "there"], 3);
		let joint = estimate_joint(counts.table(3).unwrap(), 3, &alphabet, &CapacityLimits::default()).unwrap();
		assert!(joint.is_strictly_positive());
		assert!(joint.ln().iter().all(|lp| lp.is_finite()));
		assert!((joint.sum() - 1.0).abs() < 1e-5);
	}

	#[test]
	fn it_handles_an_empty_corpus() {
		let alphabet = Alphabet::from_kind(AlphabetKind::Test);
		let joint = estimate_joint(&CountTable::new(), 2, &alphabet, &CapacityLimits::default()).unwrap();
		for p in joint.as_slice() {
			assert!((p - 1.0 / 9.0).abs() < 1e-9);
		}
	}

	#[test]
	fn it_refuses_oversized_tensors() {
		let alphabet = Alphabet::from_kind(AlphabetKind::Extended);
		let limits = CapacityLimits { max_cells: 1_000_000, warn_cells: 1_000 };
		let err = estimate_joint(&CountTable::new(), 4, &alphabet, &limits).unwrap_err();
		assert!(matches!(
			err,
			NgramError::CapacityExceeded { order: 4, cells, limit: 1_000_000 } if cells == 79u64.pow(4)
		));
		assert_eq!(check_capacity(&alphabet, 2, &limits).unwrap(), 79 * 79);
	}

	#[test]
	fn it_sizes_tensors_quietly_with_the_same_limits() {
		let alphabet = Alphabet::from_kind(AlphabetKind::Extended);
		let limits = CapacityLimits { max_cells: 1_000_000, warn_cells: 1_000 };
		assert_eq!(tensor_cells(&alphabet, 3, &limits).unwrap(), check_capacity(&alphabet, 3, &limits).unwrap());
		assert!(matches!(tensor_cells(&alphabet, 4, &limits), Err(NgramError::CapacityExceeded { order: 4, .. })));
		assert!(matches!(tensor_cells(&alphabet, 0, &limits), Err(NgramError::InvalidOrder(0))));
	}

	#[test]
	fn it_reports_huge_sizes_without_overflow() {
		assert_eq!(mebibytes(1 << 28), 2048);
		assert_eq!(mebibytes(u64::MAX), u64::MAX >> 20);
	}

	#[test]
	fn it_rejects_keys_from_another_alphabet() {
		let alphabet = Alphabet::from_kind(AlphabetKind::Test);
		let mut table = CountTable::new();
		table.insert(9, 1);
		let err = estimate_joint(&table, 2, &alphabet, &CapacityLimits::default()).unwrap_err();
		assert!(matches!(err, NgramError::ShapeMismatch { .. }));
	}

	#[test]
	fn it_rejects_bad_orders() {
		let alphabet = Alphabet::from_kind(AlphabetKind::Test);
		let err = estimate_joint(&CountTable::new(), 5, &alphabet, &CapacityLimits::default()).unwrap_err();
		assert!(matches!(err, NgramError::InvalidOrder(5)));
	}
}
