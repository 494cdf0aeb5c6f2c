//! Deterministic RNG wrapper, seed derivation and synthetic histograms.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

use crate::histogram::Histogram;

/// Deterministic RNG handle.
///
/// A master `seed: u64` must be provided by the caller. Substreams are derived
/// by hashing `(master_seed, substream_id)` with SipHash-1-3 keyed with zeros,
/// so every substream is reproducible from the master seed alone.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Creates a new RNG handle from a master seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates the handle for substream `substream` of `master_seed`.
    pub fn substream(master_seed: u64, substream: u64) -> Self {
        Self::from_seed(derive_substream_seed(master_seed, substream))
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Derives the deterministic seed for a specific substream.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

/// Samples a histogram of `shots` outcomes on `num_qubits` qubits.
///
/// Each qubit reads `1` with its own bias drawn once per histogram, which
/// gives ensembles with a spread of distinct outcomes.
pub fn synthetic_histogram(num_qubits: usize, shots: u64, rng: &mut RngHandle) -> Histogram {
    let biases: Vec<f64> = (0..num_qubits).map(|_| rng.gen::<f64>()).collect();
    let mut histogram = Histogram::new();
    let mut key = String::with_capacity(num_qubits);
    for _ in 0..shots {
        key.clear();
        for bias in &biases {
            key.push(if rng.gen::<f64>() < *bias { '1' } else { '0' });
        }
        histogram.record(key.as_str(), 1);
    }
    histogram
}

/// Samples `count` histograms, one substream of `seed` each.
pub fn synthetic_ensemble(num_qubits: usize, shots: u64, count: usize, seed: u64) -> Vec<Histogram> {
    (0..count)
        .map(|index| {
            let mut rng = RngHandle::substream(seed, index as u64);
            synthetic_histogram(num_qubits, shots, &mut rng)
        })
        .collect()
}
