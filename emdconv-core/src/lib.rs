//! emdconv-core: Core types for converting microscopy acquisitions to EMD.
//!
//! This crate provides the format-independent pieces of the converter:
//! typed image arrays, calibration axes, acquisition metadata and the
//! block-mean binning engine.
//!

pub mod binning;
pub mod calibration;
pub mod element;
pub mod error;
pub mod metadata;

pub use binning::{bin_image, bin_vector, binned_shape, BinningFactor};
pub use calibration::{CalibrationAxis, DimensionVector};
pub use element::{ComplexF32, ComplexF64, ElementType, PixelData, StackData, TypedArray};
pub use error::{Error, Result};
pub use metadata::{AcquisitionMetadata, FieldMap, FieldValue, RawImage};
