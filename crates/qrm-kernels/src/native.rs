//! Kernel bound at runtime from a native shared library.
//!
//! The library must export
//!
//! ```text
//! uint32_t qrm_abi_version(void);
//! int32_t  qrm_purity_cell(const uint64_t *masks, const uint64_t *counts, size_t len,
//!                          uint32_t subsystem_size, uint64_t shots, double *out);
//! ```
//!
//! `masks` use the same bit layout as [`crate::packed::reduce_packed`] and are
//! sorted ascending. A non-zero status is reported as a backend error.

use std::path::{Path, PathBuf};

use libloading::Library;
use qrm_core::{BitWindow, ErrorInfo, Histogram, QrmError};

use crate::overlap::{check_overlap_shots, ReferenceKernel};
use crate::packed::{reduce_packed, PackedKernel};
use crate::{BackendName, CellKernel};

/// ABI revision the host expects from `qrm_abi_version`.
pub const QRM_NATIVE_ABI_VERSION: u32 = 1;

type AbiVersionFn = unsafe extern "C" fn() -> u32;
type PurityCellFn =
    unsafe extern "C" fn(*const u64, *const u64, usize, u32, u64, *mut f64) -> i32;

fn backend_error(code: &str, message: impl Into<String>, path: &Path) -> QrmError {
    QrmError::Backend(
        ErrorInfo::new(code, message).with_context("path", path.display().to_string()),
    )
}

/// Fails unless a library reporting `version` speaks the host ABI.
pub fn verify_abi_version(version: u32) -> Result<(), QrmError> {
    if version != QRM_NATIVE_ABI_VERSION {
        return Err(QrmError::Backend(
            ErrorInfo::new(
                "native_abi_mismatch",
                format!(
                    "library ABI {version} is incompatible with host ABI {QRM_NATIVE_ABI_VERSION}"
                ),
            )
            .with_context("expected", QRM_NATIVE_ABI_VERSION)
            .with_context("actual", version),
        ));
    }
    Ok(())
}

/// Kernel whose overlap sum runs inside a dynamically loaded library.
#[derive(Debug)]
pub struct NativeKernel {
    path: PathBuf,
    purity: PurityCellFn,
    // Keeps `purity` valid; dropped last.
    _library: Library,
}

impl NativeKernel {
    /// Loads the library at `path` and binds its entry points.
    pub fn load(path: &Path) -> Result<Self, QrmError> {
        // SAFETY: loading runs the library's initialisers; the path is chosen by
        // the operator through configuration.
        let library = unsafe { Library::new(path) }
            .map_err(|err| backend_error("native_load", err.to_string(), path))?;
        // SAFETY: symbol types match the ABI documented at the top of this module.
        let (version, purity) = unsafe {
            let version = library
                .get::<AbiVersionFn>(b"qrm_abi_version\0")
                .map_err(|err| backend_error("native_symbol", err.to_string(), path))?;
            let purity = library
                .get::<PurityCellFn>(b"qrm_purity_cell\0")
                .map_err(|err| backend_error("native_symbol", err.to_string(), path))?;
            (version(), *purity)
        };
        verify_abi_version(version)
            .map_err(|err| err.with_context("path", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            purity,
            _library: library,
        })
    }

    /// Location the kernel was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CellKernel for NativeKernel {
    fn name(&self) -> BackendName {
        BackendName::Native
    }

    fn purity_cell(&self, histogram: &Histogram, window: &BitWindow) -> Result<f64, QrmError> {
        histogram.validate(window.num_qubits())?;
        let shots = histogram.shots();
        check_overlap_shots(shots)?;
        let Some(entries) = reduce_packed(histogram, window)? else {
            return ReferenceKernel.purity_cell(histogram, window);
        };
        let (masks, counts): (Vec<u64>, Vec<u64>) = entries.into_iter().unzip();
        let mut out = 0.0f64;
        // SAFETY: both buffers hold `masks.len()` elements and outlive the call;
        // `out` is a valid, exclusive f64 slot.
        let status = unsafe {
            (self.purity)(
                masks.as_ptr(),
                counts.as_ptr(),
                masks.len(),
                window.subsystem_size() as u32,
                shots,
                &mut out,
            )
        };
        if status != 0 {
            return Err(backend_error(
                "native_status",
                format!("qrm_purity_cell returned status {status}"),
                &self.path,
            ));
        }
        Ok(out)
    }

    fn magnetsq_cell(&self, histogram: &Histogram, shots: u64) -> Result<f64, QrmError> {
        PackedKernel.magnetsq_cell(histogram, shots)
    }
}
