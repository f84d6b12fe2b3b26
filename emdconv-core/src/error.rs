//! Error types for emdconv-core.

use crate::ElementType;
use thiserror::Error;

/// Result type alias for emdconv core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for emdconv operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Binning factor below 1.
    #[error("invalid binning factor {0}: must be at least 1")]
    InvalidBinningFactor(i64),

    /// Binning would leave an empty axis.
    #[error("binning factor {factor} exceeds image extent {rows}x{cols}")]
    BinningExceedsExtent {
        factor: usize,
        rows: usize,
        cols: usize,
    },

    /// A requested acquisition field is absent.
    #[error("missing metadata field: {0}")]
    MissingField(String),

    /// A requested acquisition field is present but not numeric.
    #[error("metadata field '{name}' is not numeric: {value}")]
    InvalidField { name: String, value: String },

    /// Calibration axis with zero elements.
    #[error("calibration axis must have at least one element")]
    EmptyAxis,

    /// Array shapes disagree.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Element types disagree.
    #[error("element type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: ElementType,
        actual: ElementType,
    },

    /// Slice index outside a stack.
    #[error("slice index {index} out of range for a stack of {slices} slices")]
    SliceOutOfRange { index: usize, slices: usize },
}
