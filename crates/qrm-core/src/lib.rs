#![deny(missing_docs)]
#![doc = "Histogram, subsystem window and error types shared by the randomized-measurement post-processing crates."]

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod histogram;
pub mod rng;
pub mod window;

pub use errors::{ErrorInfo, QrmError};
pub use histogram::Histogram;
pub use rng::{derive_substream_seed, synthetic_ensemble, synthetic_histogram, RngHandle};
pub use window::{window, BitWindow, MAX_PACKED_BITS};

/// Scalar produced for one input histogram, tagged with its position in the batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellResult {
    /// Position of the source histogram in the input list.
    pub index: usize,
    /// Cell value.
    pub value: f64,
}

impl CellResult {
    /// Creates a new cell result.
    pub fn new(index: usize, value: f64) -> Self {
        Self { index, value }
    }
}

impl From<(usize, f64)> for CellResult {
    fn from((index, value): (usize, f64)) -> Self {
        Self::new(index, value)
    }
}
