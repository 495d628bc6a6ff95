use log::info;

use super::joint::floor_zeros;
use super::tensor::Tensor;
use crate::error::{NgramError, Result};

/// Derives `p(symbol | prefix)` from the order-k joint tensor and the
/// order-(k-1) joint tensor of the prefixes.
///
/// Each cell of `joint` is divided by the marginal probability of its
/// prefix, then every trailing slice is renormalized to sum to 1. The
/// marginal of a prefix under `joint` is not in general the lower-order
/// joint (a word-final symbol starts no n-gram), so the division alone does
/// not yield proper distributions; the renormalization pass is what
/// guarantees them.
///
/// For bigrams, `marginal` is the unigram PDF. `joint` is consumed and
/// divided in place, so no second order-k tensor is allocated.
///
/// # Errors
/// Returns `ShapeMismatch` if `joint` is not exactly one order above
/// `marginal` over the same alphabet size, or is a unigram tensor.
pub fn estimate_conditional(joint: Tensor, marginal: &Tensor) -> Result<Tensor> {
	let mut conditional = chain_rule(joint, marginal)?;
	renormalize(&mut conditional);
	info!("order-{} conditional: {} prefixes", conditional.order(), marginal.len());
	Ok(conditional)
}

fn chain_rule(mut joint: Tensor, marginal: &Tensor) -> Result<Tensor> {
	if joint.order() < 2 || joint.order() != marginal.order() + 1 || joint.size() != marginal.size() {
		return Err(NgramError::ShapeMismatch {
			expected: format!("order-{} tensor over {} symbols", marginal.order() + 1, marginal.size()),
			actual: format!("order-{} tensor over {} symbols", joint.order(), joint.size()),
		});
	}
	for (slice, prefix) in joint.slices_mut().zip(marginal.as_slice()) {
		for cell in slice.iter_mut() {
			*cell /= prefix;
		}
	}
	Ok(joint)
}

/// Divides every trailing slice by its own sum.
///
/// A slice whose sum is not a usable divisor becomes uniform. Cells that
/// underflow are floored so no probability is exactly zero.
fn renormalize(tensor: &mut Tensor) {
	for slice in tensor.slices_mut() {
		let total: f64 = slice.iter().sum();
		if total.is_finite() && total > 0.0 {
			for cell in slice.iter_mut() {
				*cell /= total;
			}
		} else {
			let uniform = 1.0 / slice.len() as f64;
			slice.fill(uniform);
		}
		floor_zeros(slice);
	}
}
