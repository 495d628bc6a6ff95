//! Character-level n-gram probability tables.
//!
//! This crate estimates unigram to quadgram character models from a corpus
//! of words, one per line:
//! - An explicit `Alphabet` fixes the symbol set and every table's index
//! - A `Sanitizer` maps raw lines onto that alphabet
//! - Counts are accumulated sparsely, then materialized as dense tensors
//! - Joint PDFs are floored so no probability is ever zero, and conditional
//!   PDFs are renormalized so every prefix carries a proper distribution
//!
//! The usual entry point is [`Trainer`] (or the [`train`] shortcut), whose
//! result is saved and loaded with [`io::save_tables`] / [`io::load_tables`].

/// Highest supported n-gram order.
pub const MAX_ORDER: usize = 4;

/// Symbol sets and their index mapping.
pub mod alphabet;

/// Error type shared by the whole crate.
pub mod error;

/// Raw line to symbol id conversion.
pub mod sanitizer;

/// Counting and estimation pipeline.
pub mod model;

/// Corpus readers, output paths and table persistence.
pub mod io;

/// Free text to one-word-per-line pre-processing.
pub mod tokenize;

pub use alphabet::{Alphabet, AlphabetKind, NGramKey, SymbolId};
pub use error::{NgramError, Result};
pub use model::counter::NGramCounts;
pub use model::joint::CapacityLimits;
pub use model::tables::NGramTables;
pub use model::tensor::Tensor;
pub use model::trainer::{train, TrainConfig, Trainer};
pub use sanitizer::{SanitizeMode, Sanitizer};
