//! Bit-packed kernel.
//!
//! Reduced bitstrings become `u64` masks so the Hamming distance is a single
//! popcount. Dense reductions, where most of the `2^k` outcomes occur, switch
//! to applying the `[[1, -1/2], [-1/2, 1]]` kernel one qubit at a time, which
//! costs `k 2^k` instead of the quadratic pair sweep.

use std::collections::BTreeMap;

use qrm_core::{BitWindow, Histogram, QrmError, MAX_PACKED_BITS};

use crate::correlation;
use crate::overlap::{check_overlap_shots, ReferenceKernel};
use crate::{BackendName, CellKernel};

/// Widest subsystem handled by the dense transform.
pub const DENSE_MAX_BITS: usize = 20;

/// Projects the histogram through `window` into `(mask, count)` pairs sorted by mask.
///
/// Returns `Ok(None)` when the subsystem does not fit a `u64`.
pub fn reduce_packed(
    histogram: &Histogram,
    window: &BitWindow,
) -> Result<Option<Vec<(u64, u64)>>, QrmError> {
    if window.subsystem_size() > MAX_PACKED_BITS {
        return Ok(None);
    }
    histogram.validate(window.num_qubits())?;
    let mut reduced: BTreeMap<u64, u64> = BTreeMap::new();
    for (bitstring, count) in histogram.iter() {
        if let Some(mask) = window.packed(bitstring.as_bytes()) {
            *reduced.entry(mask).or_insert(0) += count;
        }
    }
    Ok(Some(reduced.into_iter().collect()))
}

fn pairwise_sum(entries: &[(u64, u64)], weights: &[f64]) -> f64 {
    let mut diagonal = 0.0f64;
    let mut off_diagonal = 0.0f64;
    for (i, &(mask_a, n_a)) in entries.iter().enumerate() {
        let n_a = n_a as f64;
        diagonal += n_a * (n_a - 1.0);
        for &(mask_b, n_b) in &entries[i + 1..] {
            let distance = (mask_a ^ mask_b).count_ones() as usize;
            off_diagonal += weights[distance] * n_a * n_b as f64;
        }
    }
    diagonal + 2.0 * off_diagonal
}

fn dense_sum(entries: &[(u64, u64)], subsystem_size: usize) -> f64 {
    let mut counts = vec![0.0f64; 1usize << subsystem_size];
    for &(mask, count) in entries {
        counts[mask as usize] = count as f64;
    }
    let mut folded = counts.clone();
    for bit in 0..subsystem_size {
        let stride = 1usize << bit;
        for base in 0..folded.len() {
            if base & stride == 0 {
                let (x, y) = (folded[base], folded[base | stride]);
                folded[base] = x - 0.5 * y;
                folded[base | stride] = y - 0.5 * x;
            }
        }
    }
    let quadratic: f64 = counts.iter().zip(&folded).map(|(n, kn)| n * kn).sum();
    let shots: f64 = counts.iter().sum();
    quadratic - shots
}

fn use_dense(distinct: usize, subsystem_size: usize) -> bool {
    subsystem_size <= DENSE_MAX_BITS
        && (distinct as f64).powi(2) > (subsystem_size.max(1) as f64) * (1u64 << subsystem_size) as f64
}

/// Evaluates the overlap double sum for packed `(mask, count)` entries.
pub fn overlap_from_packed(entries: &[(u64, u64)], subsystem_size: usize, shots: u64) -> f64 {
    let total = if use_dense(entries.len(), subsystem_size) {
        dense_sum(entries, subsystem_size)
    } else {
        let weights: Vec<f64> = (0..=subsystem_size)
            .map(|distance| (-0.5f64).powi(distance as i32))
            .collect();
        pairwise_sum(entries, &weights)
    };
    let norm = shots as f64 * (shots as f64 - 1.0);
    2.0f64.powi(subsystem_size as i32) * total / norm
}

/// Popcount-based kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackedKernel;

impl PackedKernel {
    /// Checks that the host can run the kernel at full speed.
    pub fn probe() -> Result<(), String> {
        #[cfg(target_arch = "x86_64")]
        {
            if !std::is_x86_feature_detected!("popcnt") {
                return Err("cpu does not support the popcnt instruction".to_string());
            }
        }
        Ok(())
    }
}

impl CellKernel for PackedKernel {
    fn name(&self) -> BackendName {
        BackendName::Packed
    }

    fn purity_cell(&self, histogram: &Histogram, window: &BitWindow) -> Result<f64, QrmError> {
        histogram.validate(window.num_qubits())?;
        let shots = histogram.shots();
        check_overlap_shots(shots)?;
        match reduce_packed(histogram, window)? {
            Some(entries) => Ok(overlap_from_packed(
                &entries,
                window.subsystem_size(),
                shots,
            )),
            None => ReferenceKernel.purity_cell(histogram, window),
        }
    }

    fn magnetsq_cell(&self, histogram: &Histogram, shots: u64) -> Result<f64, QrmError> {
        correlation::check_two_qubit(histogram, shots)?;
        let mut agree = 0i128;
        for (bits, count) in histogram.iter() {
            let bytes = bits.as_bytes();
            if bytes[0] == bytes[1] {
                agree += count as i128;
            } else {
                agree -= count as i128;
            }
        }
        Ok(agree as f64 / shots as f64)
    }
}
