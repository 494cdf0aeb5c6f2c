#![deny(missing_docs)]
#![doc = "Fans randomized-measurement cell computations out over a worker pool and reduces them into purity, entropy and magnetization-square quantities."]

/// Batch execution and result ordering.
pub mod dispatch;
/// Ensemble reductions and quantity bundles.
pub mod quantities;
/// Canonical JSON and YAML helpers.
pub mod serde;
/// Worker-count sizing.
pub mod workers;

pub use dispatch::{
    compute_magnetsq_cells, compute_purity_cells, run_magnetsq_cells, run_purity_cells, CellOpts,
};
pub use quantities::{
    entropy_from_purity, magnetsq_quantities, purity_quantities, reduce_magnetsq, reduce_purity,
    MagnetsqBundle, PurityBundle, PurityStats,
};
pub use workers::{available_workers, resolve_workers, workers_for, SERIAL_THRESHOLD};
