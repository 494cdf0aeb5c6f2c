//! Bitstring occurrence counts produced by one circuit execution.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, QrmError};

/// Mapping from measured bitstrings to their occurrence counts.
///
/// Bit position `i` is the `i`-th character of the key, reading left to right.
/// The container accepts arbitrary keys; [`Histogram::validate`] is the gate
/// estimators go through before touching the data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Histogram {
    counts: BTreeMap<String, u64>,
}

impl Histogram {
    /// Creates an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a histogram from `(bitstring, count)` pairs, summing repeated keys.
    pub fn from_counts<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        pairs.into_iter().collect()
    }

    /// Adds `count` occurrences of `bitstring`.
    pub fn record(&mut self, bitstring: impl Into<String>, count: u64) {
        *self.counts.entry(bitstring.into()).or_insert(0) += count;
    }

    /// Returns the count recorded for `bitstring`, zero when absent.
    pub fn get(&self, bitstring: &str) -> u64 {
        self.counts.get(bitstring).copied().unwrap_or(0)
    }

    /// Number of distinct bitstrings.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true when no bitstring was recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterates over `(bitstring, count)` pairs in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counts.iter().map(|(key, count)| (key.as_str(), *count))
    }

    /// Total number of recorded shots.
    pub fn shots(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Checks that every key is a `num_qubits` long string over `{'0', '1'}`.
    pub fn validate(&self, num_qubits: usize) -> Result<(), QrmError> {
        for key in self.counts.keys() {
            if key.len() != num_qubits {
                return Err(QrmError::Data(
                    ErrorInfo::new(
                        "bitstring_length",
                        format!(
                            "bitstring of length {} does not match {num_qubits} qubits",
                            key.len()
                        ),
                    )
                    .with_context("bitstring", key)
                    .with_context("expected", num_qubits)
                    .with_context("actual", key.len()),
                ));
            }
            if let Some(bad) = key.bytes().find(|byte| *byte != b'0' && *byte != b'1') {
                return Err(QrmError::Data(
                    ErrorInfo::new(
                        "bitstring_alphabet",
                        format!("bitstring contains non-binary character {:?}", bad as char),
                    )
                    .with_context("bitstring", key),
                ));
            }
        }
        Ok(())
    }

    /// Checks that the counts add up to the declared number of shots.
    pub fn check_shots(&self, shots: u64) -> Result<(), QrmError> {
        let total = self.shots();
        if total != shots {
            return Err(QrmError::Data(
                ErrorInfo::new(
                    "shots_mismatch",
                    format!("counts sum to {total} but {shots} shots were declared"),
                )
                .with_context("expected", shots)
                .with_context("actual", total),
            ));
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for Histogram {
    fn from_iter<T: IntoIterator<Item = (S, u64)>>(iter: T) -> Self {
        let mut histogram = Histogram::new();
        for (key, count) in iter {
            histogram.record(key, count);
        }
        histogram
    }
}

impl<'a> IntoIterator for &'a Histogram {
    type Item = (&'a String, &'a u64);
    type IntoIter = btree_map::Iter<'a, String, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_are_summed() {
        let hist = Histogram::from_counts([("01", 3), ("01", 4), ("10", 1)]);
        assert_eq!(hist.get("01"), 7);
        assert_eq!(hist.shots(), 8);
        assert_eq!(hist.len(), 2);
    }

    #[test]
    fn validate_rejects_wrong_length() {
        let hist = Histogram::from_counts([("010", 1)]);
        let err = hist.validate(2).unwrap_err();
        assert_eq!(err.info().code, "bitstring_length");
        assert_eq!(err.info().context["bitstring"], "010");
    }

    #[test]
    fn validate_rejects_non_binary() {
        let hist = Histogram::from_counts([("0x", 1)]);
        let err = hist.validate(2).unwrap_err();
        assert_eq!(err.info().code, "bitstring_alphabet");
    }
}
