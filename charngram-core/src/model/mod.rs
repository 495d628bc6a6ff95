//! Counting and estimation pipeline.
//!
//! Data flows one way through these modules:
//! - sanitized words are counted into sparse tables (`counter`)
//! - each order's counts become a dense joint PDF (`joint`)
//! - joint PDFs of adjacent orders give conditional PDFs (`conditional`)
//! - `trainer` drives the whole run and returns `NGramTables`

/// Sparse n-gram counts, orders 1 to 4.
///
/// Accumulation is additive so partial counts can be merged in any order.
pub mod counter;

/// Dense `A^order` probability arrays.
pub mod tensor;

/// Counts to floored, normalized joint PDFs.
///
/// Also holds the capacity checks done before any dense allocation.
pub mod joint;

/// Chain-rule conditional PDFs with per-prefix renormalization.
pub mod conditional;

/// Output of a training run, persisted as a whole.
pub mod tables;

/// Corpus pass and estimation in dependency order.
pub mod trainer;
