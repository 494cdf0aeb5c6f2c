use std::f64::consts::LN_2;

use qrm_core::{BitWindow, CellResult, ErrorInfo, Histogram, QrmError};
use qrm_kernels::{resolve_backend, BackendName};
use serde::{Deserialize, Serialize};

use crate::dispatch::{run_magnetsq_cells, run_purity_cells, CellOpts};

fn empty_ensemble() -> QrmError {
    QrmError::Config(ErrorInfo::new(
        "empty_ensemble",
        "at least one cell is required to form an ensemble average",
    ))
}

/// Second-order Rényi entropy `-log2(purity)`.
pub fn entropy_from_purity(purity: f64) -> f64 {
    -purity.log2()
}

/// Ensemble average of purity cells and its spread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PurityStats {
    /// Mean of the cells.
    pub purity: f64,
    /// Population standard deviation of the cells.
    pub purity_sd: f64,
    /// `-log2(purity)`.
    pub entropy: f64,
    /// First-order propagation of `purity_sd` into the entropy.
    pub entropy_sd: f64,
}

/// Reduces purity cells into their ensemble average.
///
/// Cells are summed in index order so the result does not depend on which
/// worker finished first. A non-positive mean yields a non-finite entropy.
pub fn reduce_purity(cells: &[CellResult]) -> Result<PurityStats, QrmError> {
    if cells.is_empty() {
        return Err(empty_ensemble());
    }
    let mut ordered: Vec<&CellResult> = cells.iter().collect();
    ordered.sort_by_key(|cell| cell.index);
    let count = ordered.len() as f64;
    let purity = ordered.iter().map(|cell| cell.value).sum::<f64>() / count;
    let variance = ordered
        .iter()
        .map(|cell| (cell.value - purity).powi(2))
        .sum::<f64>()
        / count;
    let purity_sd = variance.sqrt();
    Ok(PurityStats {
        purity,
        purity_sd,
        entropy: entropy_from_purity(purity),
        entropy_sd: purity_sd / LN_2 / purity,
    })
}

fn check_qubits(num_qubits: usize) -> Result<(), QrmError> {
    if num_qubits == 0 {
        return Err(QrmError::Config(ErrorInfo::new(
            "zero_qubits",
            "magnetization square needs at least one qubit",
        )));
    }
    Ok(())
}

/// Combines magnetization-square cells as `(sum + N) / N^2`.
pub fn reduce_magnetsq(cells: &[CellResult], num_qubits: usize) -> Result<f64, QrmError> {
    check_qubits(num_qubits)?;
    let mut ordered: Vec<&CellResult> = cells.iter().collect();
    ordered.sort_by_key(|cell| cell.index);
    let sum: f64 = ordered.iter().map(|cell| cell.value).sum();
    let n = num_qubits as f64;
    Ok((sum + n) / (n * n))
}

/// Purity and entropy of one subsystem over an ensemble of histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurityBundle {
    /// Ensemble-averaged subsystem purity.
    pub purity: f64,
    /// Second-order Rényi entropy of the subsystem.
    pub entropy: f64,
    /// Standard deviation of the purity cells.
    pub purity_sd: f64,
    /// Entropy uncertainty propagated from `purity_sd`.
    pub entropy_sd: f64,
    /// Purity of the whole measured system, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purity_all_sys: Option<f64>,
    /// Entropy of the whole measured system, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entropy_all_sys: Option<f64>,
    /// Window the subsystem quantities refer to.
    pub window: BitWindow,
    /// Number of histograms processed.
    pub cells_num: usize,
    /// Kernel that produced the cells.
    pub backend: BackendName,
}

/// Magnetization square over an ensemble of two-qubit histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnetsqBundle {
    /// `(sum of cells + N) / N^2`.
    pub magnetsq: f64,
    /// Number of histograms processed.
    pub cells_num: usize,
    /// Qubit count `N` used for the normalisation.
    pub num_qubits: usize,
    /// Kernel that produced the cells.
    pub backend: BackendName,
}

/// Computes the purity bundle for `window`.
///
/// With `all_system` the ensemble is also evaluated over every measured qubit.
pub fn purity_quantities(
    histograms: Vec<Histogram>,
    window: &BitWindow,
    opts: &CellOpts,
    all_system: bool,
) -> Result<PurityBundle, QrmError> {
    let kernel = resolve_backend(opts.backend);
    let full = BitWindow::full(window.num_qubits());
    let needs_second_pass = all_system && *window != full;
    let all_sys_input = if needs_second_pass {
        Some(histograms.clone())
    } else {
        None
    };

    let cells = run_purity_cells(histograms, window, kernel.as_ref(), opts)?;
    let stats = reduce_purity(&cells)?;

    let all_sys = match all_sys_input {
        Some(histograms) => {
            let cells = run_purity_cells(histograms, &full, kernel.as_ref(), opts)?;
            Some(reduce_purity(&cells)?.purity)
        }
        None if all_system => Some(stats.purity),
        None => None,
    };

    Ok(PurityBundle {
        purity: stats.purity,
        entropy: stats.entropy,
        purity_sd: stats.purity_sd,
        entropy_sd: stats.entropy_sd,
        purity_all_sys: all_sys,
        entropy_all_sys: all_sys.map(entropy_from_purity),
        window: *window,
        cells_num: cells.len(),
        backend: kernel.name(),
    })
}

/// Computes the magnetization-square bundle for a `num_qubits` system.
pub fn magnetsq_quantities(
    histograms: Vec<Histogram>,
    shots: u64,
    num_qubits: usize,
    opts: &CellOpts,
) -> Result<MagnetsqBundle, QrmError> {
    check_qubits(num_qubits)?;
    let kernel = resolve_backend(opts.backend);
    let cells = run_magnetsq_cells(histograms, shots, kernel.as_ref(), opts)?;
    Ok(MagnetsqBundle {
        magnetsq: reduce_magnetsq(&cells, num_qubits)?,
        cells_num: cells.len(),
        num_qubits,
        backend: kernel.name(),
    })
}
