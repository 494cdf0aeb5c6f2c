#![deny(missing_docs)]
#![doc = "Shared library exporting the `qrm_abi_version` and `qrm_purity_cell` entry points expected by the native kernel loader."]

/// ABI revision reported by [`qrm_abi_version`].
pub const ABI_VERSION: u32 = 1;

/// Widest subsystem this library accepts.
pub const MAX_SUBSYSTEM_BITS: u32 = 16;

/// A required pointer was null.
pub const STATUS_NULL_POINTER: i32 = 1;
/// The subsystem exceeds [`MAX_SUBSYSTEM_BITS`].
pub const STATUS_TOO_WIDE: i32 = 2;
/// Masks were not strictly ascending.
pub const STATUS_UNSORTED: i32 = 3;
/// Fewer than two shots.
pub const STATUS_TOO_FEW_SHOTS: i32 = 4;

/// Reports the ABI revision.
#[no_mangle]
pub extern "C" fn qrm_abi_version() -> u32 {
    ABI_VERSION
}

/// Writes the purity cell of `len` sorted `(mask, count)` entries into `out`.
///
/// # Safety
///
/// `masks` and `counts` must point to `len` readable elements and `out` to a
/// writable `f64`.
#[no_mangle]
pub unsafe extern "C" fn qrm_purity_cell(
    masks: *const u64,
    counts: *const u64,
    len: usize,
    subsystem_size: u32,
    shots: u64,
    out: *mut f64,
) -> i32 {
    if out.is_null() || (len > 0 && (masks.is_null() || counts.is_null())) {
        return STATUS_NULL_POINTER;
    }
    if subsystem_size > MAX_SUBSYSTEM_BITS {
        return STATUS_TOO_WIDE;
    }
    if shots < 2 {
        return STATUS_TOO_FEW_SHOTS;
    }
    let (masks, counts) = if len == 0 {
        (&[][..], &[][..])
    } else {
        (
            std::slice::from_raw_parts(masks, len),
            std::slice::from_raw_parts(counts, len),
        )
    };
    if masks.windows(2).any(|pair| pair[0] >= pair[1]) {
        return STATUS_UNSORTED;
    }
    *out = overlap(masks, counts, subsystem_size, shots);
    0
}

/// Pairwise overlap sum over packed entries.
pub fn overlap(masks: &[u64], counts: &[u64], subsystem_size: u32, shots: u64) -> f64 {
    let mut total = 0.0f64;
    for (a, (&mask_a, &n_a)) in masks.iter().zip(counts).enumerate() {
        let n_a = n_a as f64;
        total += n_a * (n_a - 1.0);
        for (&mask_b, &n_b) in masks[a + 1..].iter().zip(&counts[a + 1..]) {
            let distance = (mask_a ^ mask_b).count_ones() as i32;
            total += 2.0 * (-0.5f64).powi(distance) * n_a * n_b as f64;
        }
    }
    let norm = shots as f64 * (shots as f64 - 1.0);
    2.0f64.powi(subsystem_size as i32) * total / norm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsorted_masks() {
        let masks = [3u64, 1];
        let counts = [2u64, 2];
        let mut out = 0.0;
        let status =
            unsafe { qrm_purity_cell(masks.as_ptr(), counts.as_ptr(), 2, 2, 4, &mut out) };
        assert_eq!(status, STATUS_UNSORTED);
    }

    #[test]
    fn pure_qubit_cell_is_two() {
        let mut out = 0.0;
        let status = unsafe { qrm_purity_cell([0u64].as_ptr(), [8u64].as_ptr(), 1, 1, 8, &mut out) };
        assert_eq!(status, 0);
        assert!((out - 2.0).abs() < 1e-12);
    }
}
