//! Calibration axes and dimension vectors.

use crate::binning::{bin_vector, BinningFactor};
use crate::{Error, Result};
use ndarray::Array1;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Linear mapping from element index to physical coordinate.
///
/// `coord[i] = offset + delta * (i - reference_element)` for `i` in `0..len`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationAxis {
    /// Physical coordinate of the reference element.
    pub offset: f64,
    /// Step between neighbouring elements. Zero is a degenerate but valid axis.
    pub delta: f64,
    /// Index whose coordinate equals `offset`.
    pub reference_element: i64,
    length: usize,
}

impl CalibrationAxis {
    /// Creates a calibration axis.
    ///
    /// # Errors
    /// Returns [`Error::EmptyAxis`] if `length` is zero.
    pub fn new(offset: f64, delta: f64, reference_element: i64, length: usize) -> Result<Self> {
        if length == 0 {
            return Err(Error::EmptyAxis);
        }
        Ok(Self {
            offset,
            delta,
            reference_element,
            length,
        })
    }

    /// Pixel-index axis: offset 0, delta 1, reference element 0.
    ///
    /// # Errors
    /// Returns [`Error::EmptyAxis`] if `length` is zero.
    pub fn pixels(length: usize) -> Result<Self> {
        Self::new(0.0, 1.0, 0, length)
    }

    /// Number of elements along the axis.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the axis has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Physical coordinate of element `index`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn coordinate(&self, index: usize) -> f64 {
        let steps = index as i64 - self.reference_element;
        self.offset + self.delta * steps as f64
    }

    /// Coordinate vector for all elements.
    #[must_use]
    pub fn coordinates(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.length, |i| self.coordinate(i))
    }
}

/// A named, unit-labelled coordinate vector for one axis of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionVector {
    pub values: Array1<f64>,
    pub name: String,
    pub units: String,
}

impl DimensionVector {
    pub fn new(values: Array1<f64>, name: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            values,
            name: name.into(),
            units: units.into(),
        }
    }

    /// Builds the coordinate vector of a calibration axis.
    pub fn from_axis(axis: &CalibrationAxis, name: impl Into<String>, units: impl Into<String>) -> Self {
        Self::new(axis.coordinates(), name, units)
    }

    /// Block-mean reduces the coordinates by `factor`.
    #[must_use]
    pub fn binned(self, factor: BinningFactor) -> Self {
        if factor.is_identity() {
            return self;
        }
        Self {
            values: bin_vector(&self.values, factor),
            ..self
        }
    }

    /// Number of coordinates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the vector holds no coordinates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
