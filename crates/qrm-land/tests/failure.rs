use qrm_core::{BitWindow, Histogram, QrmError};
use qrm_kernels::{BackendName, CellKernel, ReferenceKernel};
use qrm_land::{run_magnetsq_cells, run_purity_cells, CellOpts};

#[derive(Debug)]
struct PanicsWithoutPair;

impl CellKernel for PanicsWithoutPair {
    fn name(&self) -> BackendName {
        BackendName::Reference
    }

    fn purity_cell(&self, histogram: &Histogram, window: &BitWindow) -> Result<f64, QrmError> {
        if histogram.get("11") == 0 {
            panic!("no 11 outcome");
        }
        ReferenceKernel.purity_cell(histogram, window)
    }

    fn magnetsq_cell(&self, histogram: &Histogram, shots: u64) -> Result<f64, QrmError> {
        ReferenceKernel.magnetsq_cell(histogram, shots)
    }
}

fn batch() -> Vec<Histogram> {
    (0..8)
        .map(|_| Histogram::from_counts([("00", 3), ("11", 5)]))
        .collect()
}

#[test]
fn malformed_cell_reports_its_index() {
    let mut histograms = batch();
    histograms[5] = Histogram::from_counts([("00", 3), ("1", 5)]);
    for workers in [1, 4] {
        let err = run_purity_cells(
            histograms.clone(),
            &BitWindow::full(2),
            &ReferenceKernel,
            &CellOpts::default().with_workers(workers),
        )
        .unwrap_err();
        assert!(matches!(err, QrmError::Data(_)));
        assert_eq!(err.info().code, "bitstring_length");
        assert_eq!(err.index(), Some(5));
    }
}

#[test]
fn panicking_kernel_becomes_worker_error() {
    let mut histograms = batch();
    histograms[2] = Histogram::from_counts([("00", 3), ("01", 5)]);
    for workers in [1, 4] {
        let err = run_purity_cells(
            histograms.clone(),
            &BitWindow::full(2),
            &PanicsWithoutPair,
            &CellOpts::default().with_workers(workers),
        )
        .unwrap_err();
        match &err {
            QrmError::Worker(info) => {
                assert_eq!(info.code, "cell_panicked");
                assert!(info.message.contains("no 11 outcome"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(err.index(), Some(2));
    }
}

#[test]
fn zero_workers_is_rejected() {
    let err = run_purity_cells(
        batch(),
        &BitWindow::full(2),
        &ReferenceKernel,
        &CellOpts::default().with_workers(0),
    )
    .unwrap_err();
    assert!(matches!(err, QrmError::Config(_)));
    assert_eq!(err.info().code, "zero_workers");
}

#[test]
fn declared_shots_are_enforced_for_purity() {
    let opts = CellOpts {
        shots: Some(9),
        ..CellOpts::default().with_workers(1)
    };
    let err = run_purity_cells(batch(), &BitWindow::full(2), &ReferenceKernel, &opts).unwrap_err();
    assert_eq!(err.info().code, "shots_mismatch");
    assert_eq!(err.index(), Some(0));
}

#[test]
fn zero_declared_shots_fail_before_any_cell() {
    let err = run_magnetsq_cells(batch(), 0, &ReferenceKernel, &CellOpts::default()).unwrap_err();
    assert!(matches!(err, QrmError::Config(_)));
    assert_eq!(err.index(), None);
}
