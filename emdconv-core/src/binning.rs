//! Integer-factor block-mean binning.
//!
//! Binning reduces an array by averaging non-overlapping `f x f` blocks (or
//! runs of `f` elements for vectors). Rows, columns or elements beyond the
//! largest multiple of `f` are dropped. Means are computed in `f64` and kept
//! in floating point: real inputs bin to `Float64`, complex inputs to
//! `Complex128`.

use crate::element::{ComplexF64, RealElement};
use crate::{Error, PixelData, Result};
use ndarray::{s, Array1, Array2};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A validated binning factor (at least 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "i64", into = "i64"))]
pub struct BinningFactor(usize);

impl BinningFactor {
    /// No binning.
    pub const ONE: Self = Self(1);

    /// Validates a raw factor.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBinningFactor`] if `factor < 1`.
    pub fn new(factor: i64) -> Result<Self> {
        usize::try_from(factor)
            .ok()
            .filter(|&f| f >= 1)
            .map(Self)
            .ok_or(Error::InvalidBinningFactor(factor))
    }

    /// Caller-side policy for user-typed factors.
    ///
    /// Unparsable or non-positive input, and odd input when `require_even` is
    /// set, fall back to [`BinningFactor::ONE`] with a warning instead of
    /// failing.
    #[must_use]
    pub fn parse_lenient(text: &str, require_even: bool) -> Self {
        let parsed = text
            .trim()
            .parse::<i64>()
            .map_err(|e| e.to_string())
            .and_then(|f| Self::new(f).map_err(|e| e.to_string()));

        match parsed {
            Ok(factor) if require_even && factor.0 % 2 != 0 && !factor.is_identity() => {
                log::warn!("binning factor {factor} is odd, falling back to 1");
                Self::ONE
            }
            Ok(factor) => factor,
            Err(reason) => {
                log::warn!("ignoring binning factor '{text}' ({reason}), falling back to 1");
                Self::ONE
            }
        }
    }

    /// The factor as an integer.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Returns true for factor 1.
    #[must_use]
    pub const fn is_identity(self) -> bool {
        self.0 == 1
    }

    /// Output extent of an axis of `len` elements.
    #[must_use]
    pub const fn reduce(self, len: usize) -> usize {
        len / self.0
    }
}

impl Default for BinningFactor {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for BinningFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for BinningFactor {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<BinningFactor> for i64 {
    #[allow(clippy::cast_possible_wrap)]
    fn from(value: BinningFactor) -> Self {
        value.0 as i64
    }
}

/// Output shape of a `(rows, cols)` image binned by `factor`.
#[must_use]
pub const fn binned_shape(shape: (usize, usize), factor: BinningFactor) -> (usize, usize) {
    (factor.reduce(shape.0), factor.reduce(shape.1))
}

/// Bins an image payload.
///
/// Factor 1 returns an identical copy with the original element type.
#[must_use]
pub fn bin_image(pixels: &PixelData, factor: BinningFactor) -> PixelData {
    if factor.is_identity() {
        return pixels.clone();
    }
    match pixels {
        PixelData::UInt8(a) => PixelData::Float64(bin_real(a, factor)),
        PixelData::UInt16(a) => PixelData::Float64(bin_real(a, factor)),
        PixelData::UInt32(a) => PixelData::Float64(bin_real(a, factor)),
        PixelData::UInt64(a) => PixelData::Float64(bin_real(a, factor)),
        PixelData::Int8(a) => PixelData::Float64(bin_real(a, factor)),
        PixelData::Int16(a) => PixelData::Float64(bin_real(a, factor)),
        PixelData::Int32(a) => PixelData::Float64(bin_real(a, factor)),
        PixelData::Int64(a) => PixelData::Float64(bin_real(a, factor)),
        PixelData::Float32(a) => PixelData::Float64(bin_real(a, factor)),
        PixelData::Float64(a) => PixelData::Float64(bin_real(a, factor)),
        PixelData::Complex64(a) => {
            PixelData::Complex128(bin_complex(&a.mapv(ComplexF64::from), factor))
        }
        PixelData::Complex128(a) => PixelData::Complex128(bin_complex(a, factor)),
    }
}

/// Block-mean of a real 2D array.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bin_real<T: RealElement>(input: &Array2<T>, factor: BinningFactor) -> Array2<f64> {
    let f = factor.get();
    let (rows, cols) = binned_shape(input.dim(), factor);
    let area = (f * f) as f64;
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let block = input.slice(s![r * f..(r + 1) * f, c * f..(c + 1) * f]);
        block.iter().map(|&v| v.to_f64()).sum::<f64>() / area
    })
}

/// Block-mean of a complex 2D array, averaging real and imaginary parts.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bin_complex(input: &Array2<ComplexF64>, factor: BinningFactor) -> Array2<ComplexF64> {
    let f = factor.get();
    let (rows, cols) = binned_shape(input.dim(), factor);
    let area = (f * f) as f64;
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let block = input.slice(s![r * f..(r + 1) * f, c * f..(c + 1) * f]);
        let (re, im) = block
            .iter()
            .fold((0.0, 0.0), |(re, im), v| (re + v.re, im + v.im));
        ComplexF64::new(re / area, im / area)
    })
}

/// Block-mean of a coordinate vector over runs of `factor` elements.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bin_vector(input: &Array1<f64>, factor: BinningFactor) -> Array1<f64> {
    let f = factor.get();
    if f == 1 {
        return input.clone();
    }
    let len = factor.reduce(input.len());
    Array1::from_shape_fn(len, |i| {
        input.slice(s![i * f..(i + 1) * f]).sum() / f as f64
    })
}
