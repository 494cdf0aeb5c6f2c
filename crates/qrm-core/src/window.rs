//! Subsystem selection over bit positions, including periodic windows.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, QrmError};

/// Largest subsystem that fits a packed `u64` projection.
pub const MAX_PACKED_BITS: usize = 64;

fn config_error(code: &str, message: impl Into<String>) -> QrmError {
    QrmError::Config(ErrorInfo::new(code, message))
}

/// Validated half-open range `[start, end)` over `0..num_qubits`.
///
/// When `start > end` the window wraps past the last qubit back to position
/// zero. `start == end` is empty unless the subsystem covers every qubit, in
/// which case it is the whole ring read from `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct BitWindow {
    num_qubits: usize,
    start: usize,
    end: usize,
    subsystem_size: usize,
}

// Unvalidated wire form; deserialized windows go through `BitWindow::new`.
#[derive(Deserialize)]
struct RawWindow {
    num_qubits: usize,
    start: usize,
    end: usize,
    subsystem_size: usize,
}

impl TryFrom<RawWindow> for BitWindow {
    type Error = QrmError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        BitWindow::new(raw.num_qubits, raw.start, raw.end, raw.subsystem_size)
    }
}

impl BitWindow {
    /// Validates the range against the qubit count and declared subsystem size.
    pub fn new(
        num_qubits: usize,
        start: usize,
        end: usize,
        subsystem_size: usize,
    ) -> Result<Self, QrmError> {
        if subsystem_size > num_qubits {
            return Err(config_error(
                "subsystem_size",
                format!("subsystem of {subsystem_size} qubits exceeds the {num_qubits} measured"),
            )
            .with_sizes(num_qubits, subsystem_size));
        }
        if end > num_qubits || start > num_qubits || (start > end && start == num_qubits) {
            return Err(config_error(
                "window_bounds",
                format!("range [{start}, {end}) lies outside 0..{num_qubits}"),
            )
            .with_range(start, end));
        }
        let span = if start < end {
            end - start
        } else if start > end {
            num_qubits - start + end
        } else if subsystem_size == num_qubits && start < num_qubits {
            num_qubits
        } else {
            0
        };
        if span != subsystem_size {
            return Err(config_error(
                "window_span",
                format!("range [{start}, {end}) covers {span} qubits, not {subsystem_size}"),
            )
            .with_range(start, end)
            .with_sizes(subsystem_size, span));
        }
        Ok(Self {
            num_qubits,
            start,
            end,
            subsystem_size,
        })
    }

    /// Window covering every qubit in order.
    pub fn full(num_qubits: usize) -> Self {
        Self {
            num_qubits,
            start: 0,
            end: num_qubits,
            subsystem_size: num_qubits,
        }
    }

    /// Builds a window from signed bounds where negative values count from the end.
    ///
    /// `(-2, 1)` on five qubits selects positions `3, 4, 0`.
    pub fn from_signed(
        num_qubits: usize,
        start: i64,
        end: i64,
        subsystem_size: usize,
    ) -> Result<Self, QrmError> {
        let n = num_qubits as i64;
        if start < -n || end < -n || start > n || end > n {
            return Err(config_error(
                "window_bounds",
                format!("signed range ({start}, {end}) lies outside -{num_qubits}..={num_qubits}"),
            ));
        }
        let normalize = |value: i64| if value < 0 { (n + value) as usize } else { value as usize };
        Self::new(num_qubits, normalize(start), normalize(end), subsystem_size)
    }

    /// Total number of measured qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// First selected position.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Exclusive end of the range.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of selected positions.
    pub fn subsystem_size(&self) -> usize {
        self.subsystem_size
    }

    /// Whether the selection crosses from the last qubit back to the first.
    pub fn is_wrapping(&self) -> bool {
        self.subsystem_size > 0 && self.start + self.subsystem_size > self.num_qubits
    }

    /// Selected positions in window order.
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.subsystem_size).map(move |offset| (self.start + offset) % self.num_qubits)
    }

    /// Extracts the window from `bitstring` by slicing (and concatenating when wrapping).
    pub fn apply<'a>(&self, bitstring: &'a str) -> Result<Cow<'a, str>, QrmError> {
        self.check_width(bitstring)?;
        if self.subsystem_size == 0 {
            return Ok(Cow::Borrowed(""));
        }
        if !self.is_wrapping() {
            let stop = self.start + self.subsystem_size;
            return Ok(Cow::Borrowed(&bitstring[self.start..stop]));
        }
        let head = self.start + self.subsystem_size - self.num_qubits;
        let mut owned = String::with_capacity(self.subsystem_size);
        owned.push_str(&bitstring[self.start..]);
        owned.push_str(&bitstring[..head]);
        Ok(Cow::Owned(owned))
    }

    /// Extracts the window by walking positions modulo the qubit count.
    ///
    /// Agrees with [`BitWindow::apply`] for every window.
    pub fn apply_cyclic(&self, bitstring: &str) -> Result<String, QrmError> {
        self.check_width(bitstring)?;
        let bytes = bitstring.as_bytes();
        Ok(self.positions().map(|pos| bytes[pos] as char).collect())
    }

    /// Packs the selected bits of an ASCII `0`/`1` string into an integer.
    ///
    /// Window offset `i` lands on bit `i`. Returns `None` when the subsystem is
    /// wider than [`MAX_PACKED_BITS`] or the input has the wrong width.
    pub fn packed(&self, bits: &[u8]) -> Option<u64> {
        if self.subsystem_size > MAX_PACKED_BITS || bits.len() != self.num_qubits {
            return None;
        }
        let mut value = 0u64;
        for (offset, pos) in self.positions().enumerate() {
            if bits[pos] == b'1' {
                value |= 1u64 << offset;
            }
        }
        Some(value)
    }

    fn check_width(&self, bitstring: &str) -> Result<(), QrmError> {
        if bitstring.len() != self.num_qubits || !bitstring.is_ascii() {
            return Err(QrmError::Data(
                ErrorInfo::new(
                    "bitstring_length",
                    format!(
                        "bitstring {bitstring:?} is not {} ASCII characters long",
                        self.num_qubits
                    ),
                )
                .with_context("bitstring", bitstring)
                .with_context("expected", self.num_qubits)
                .with_context("actual", bitstring.len()),
            ));
        }
        Ok(())
    }
}

/// Returns the `subsystem_size` characters of `bitstring` starting at `start`
/// and continuing modulo its length, after validating `(start, end)`.
pub fn window(
    bitstring: &str,
    start: usize,
    end: usize,
    subsystem_size: usize,
) -> Result<String, QrmError> {
    let window = BitWindow::new(bitstring.len(), start, end, subsystem_size)?;
    Ok(window.apply(bitstring)?.into_owned())
}

trait WindowContext {
    fn with_range(self, start: usize, end: usize) -> Self;
    fn with_sizes(self, expected: usize, actual: usize) -> Self;
}

impl WindowContext for QrmError {
    fn with_range(self, start: usize, end: usize) -> Self {
        match self {
            QrmError::Config(info) => QrmError::Config(
                info.with_context("start", start)
                    .with_context("end", end),
            ),
            other => other,
        }
    }

    fn with_sizes(self, expected: usize, actual: usize) -> Self {
        match self {
            QrmError::Config(info) => QrmError::Config(
                info.with_context("expected", expected)
                    .with_context("actual", actual),
            ),
            other => other,
        }
    }
}
