#![deny(missing_docs)]
#![doc = "Per-histogram purity and magnetization-square cell estimators with a capability-probed registry of interchangeable numeric kernels."]

use std::fmt::Debug;

use qrm_core::{BitWindow, Histogram, QrmError};

/// Kernel registry, probing and resolution.
pub mod backend;
/// Magnetization-square (parity correlation) cells.
pub mod correlation;
/// Kernel bound from a native shared library.
#[cfg(feature = "dynamic")]
pub mod native;
/// Purity (second-order overlap) cells and the reference kernel.
pub mod overlap;
/// Bit-packed kernel.
pub mod packed;

pub use backend::{
    availability, registry, resolve_backend, BackendDescriptor, BackendName, BackendRegistry,
    ProbeOpts, NATIVE_KERNEL_ENV,
};
pub use correlation::{magnetsq_cell, parity_correlation};
#[cfg(feature = "dynamic")]
pub use native::{verify_abi_version, NativeKernel, QRM_NATIVE_ABI_VERSION};
pub use overlap::{overlap_from_reduced, purity_cell, reduce, ReferenceKernel};
pub use packed::{overlap_from_packed, reduce_packed, PackedKernel};

/// Interchangeable implementation of the cell computations.
///
/// Every variant validates its input the same way and agrees with
/// [`ReferenceKernel`] to floating point tolerance.
pub trait CellKernel: Debug + Send + Sync {
    /// Variant implemented by this kernel.
    fn name(&self) -> BackendName;

    /// Second-order overlap of `histogram` restricted to `window`.
    ///
    /// The shot count is the histogram's total count.
    fn purity_cell(&self, histogram: &Histogram, window: &BitWindow) -> Result<f64, QrmError>;

    /// Parity correlation of a two-qubit histogram holding `shots` outcomes.
    fn magnetsq_cell(&self, histogram: &Histogram, shots: u64) -> Result<f64, QrmError>;
}
