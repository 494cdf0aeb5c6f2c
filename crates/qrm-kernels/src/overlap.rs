//! Second-order overlap estimator behind the purity cell.
//!
//! For a histogram reduced onto a `k`-qubit window with `S` shots the cell is
//!
//! ```text
//! 2^k / (S (S - 1)) * sum_{a, b} (-2)^(-D(a, b)) * (n_a n_b - [a == b] n_a)
//! ```
//!
//! where `D` is the Hamming distance. Dropping the `n_a` self-pair term and
//! normalising by ordered pairs of distinct shots removes the finite-shot bias,
//! so averaging cells over random unitaries estimates `Tr(rho_A^2)`.

use qrm_core::{BitWindow, CellResult, ErrorInfo, Histogram, QrmError};

use crate::correlation;
use crate::{BackendName, CellKernel};

/// Fails unless the histogram holds at least two shots.
pub fn check_overlap_shots(shots: u64) -> Result<(), QrmError> {
    if shots < 2 {
        return Err(QrmError::Data(
            ErrorInfo::new(
                "insufficient_shots",
                format!("overlap estimator needs at least two shots, histogram has {shots}"),
            )
            .with_context("actual", shots)
            .with_hint("the shot-noise correction divides by shots * (shots - 1)"),
        ));
    }
    Ok(())
}

/// Projects every bitstring through `window`, summing colliding projections.
pub fn reduce(histogram: &Histogram, window: &BitWindow) -> Result<Histogram, QrmError> {
    histogram.validate(window.num_qubits())?;
    let mut reduced = Histogram::new();
    for (bitstring, count) in histogram.iter() {
        reduced.record(window.apply(bitstring)?, count);
    }
    Ok(reduced)
}

fn hamming(a: &str, b: &str) -> i32 {
    a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count() as i32
}

/// Evaluates the double sum over a histogram already reduced to `subsystem_size` bits.
pub fn overlap_from_reduced(reduced: &Histogram, subsystem_size: usize, shots: u64) -> f64 {
    let norm = shots as f64 * (shots as f64 - 1.0);
    let mut total = 0.0f64;
    for (s_a, n_a) in reduced.iter() {
        for (s_b, n_b) in reduced.iter() {
            let weight = (-2.0f64).powi(-hamming(s_a, s_b));
            let pairs = if s_a == s_b {
                n_a as f64 * (n_a as f64 - 1.0)
            } else {
                n_a as f64 * n_b as f64
            };
            total += weight * pairs / norm;
        }
    }
    2.0f64.powi(subsystem_size as i32) * total
}

/// String based kernel used as the universal fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceKernel;

impl CellKernel for ReferenceKernel {
    fn name(&self) -> BackendName {
        BackendName::Reference
    }

    fn purity_cell(&self, histogram: &Histogram, window: &BitWindow) -> Result<f64, QrmError> {
        histogram.validate(window.num_qubits())?;
        let shots = histogram.shots();
        check_overlap_shots(shots)?;
        let reduced = reduce(histogram, window)?;
        Ok(overlap_from_reduced(&reduced, window.subsystem_size(), shots))
    }

    fn magnetsq_cell(&self, histogram: &Histogram, shots: u64) -> Result<f64, QrmError> {
        correlation::parity_correlation(histogram, shots)
    }
}

/// Computes the purity cell for histogram `index` with `kernel`.
///
/// Errors are tagged with `index`.
pub fn purity_cell(
    index: usize,
    histogram: &Histogram,
    window: &BitWindow,
    kernel: &dyn CellKernel,
) -> Result<CellResult, QrmError> {
    kernel
        .purity_cell(histogram, window)
        .map(|value| CellResult::new(index, value))
        .map_err(|err| err.at_index(index))
}
