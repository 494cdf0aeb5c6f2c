//! Two-qubit parity correlation behind the magnetization-square cell.

use qrm_core::{CellResult, ErrorInfo, Histogram, QrmError};

use crate::CellKernel;

/// Fails when `shots` is zero.
pub fn check_shots_declared(shots: u64) -> Result<(), QrmError> {
    if shots == 0 {
        return Err(QrmError::Config(ErrorInfo::new(
            "zero_shots",
            "magnetization-square cells need a positive shot count",
        )));
    }
    Ok(())
}

/// Validates a two-qubit histogram against the declared shot count.
pub fn check_two_qubit(histogram: &Histogram, shots: u64) -> Result<(), QrmError> {
    check_shots_declared(shots)?;
    histogram.validate(2)?;
    histogram.check_shots(shots)
}

/// `sum(+count / shots)` over agreeing outcomes minus the same over disagreeing ones.
pub fn parity_correlation(histogram: &Histogram, shots: u64) -> Result<f64, QrmError> {
    check_two_qubit(histogram, shots)?;
    let mut cell = 0.0f64;
    for (bits, count) in histogram.iter() {
        let share = count as f64 / shots as f64;
        if bits == "00" || bits == "11" {
            cell += share;
        } else {
            cell -= share;
        }
    }
    Ok(cell)
}

/// Computes the magnetization-square cell for histogram `index` with `kernel`.
pub fn magnetsq_cell(
    index: usize,
    histogram: &Histogram,
    shots: u64,
    kernel: &dyn CellKernel,
) -> Result<CellResult, QrmError> {
    kernel
        .magnetsq_cell(histogram, shots)
        .map(|value| CellResult::new(index, value))
        .map_err(|err| err.at_index(index))
}
