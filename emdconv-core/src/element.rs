//! Element types and typed arrays.
//!
//! Decoded images are stored as a closed set of typed `ndarray` arrays. The
//! element type of an array is always recoverable from its variant, so no
//! separate tag can drift out of sync with the payload.

use crate::{Error, Result};
use ndarray::{Array, Array2, Array3, Axis, Dim, Dimension, Ix2, Ix3};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Numeric element type of an image payload.
///
/// Complex names follow the total width convention: `Complex64` is a pair of
/// `f32`, `Complex128` a pair of `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ElementType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

impl ElementType {
    /// Size of one element in bytes.
    #[must_use]
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 | Self::Complex64 => 8,
            Self::Complex128 => 16,
        }
    }

    /// Returns true for the complex variants.
    #[must_use]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// Element type produced by block-mean binning of this type.
    #[must_use]
    pub const fn binned(self) -> Self {
        if self.is_complex() {
            Self::Complex128
        } else {
            Self::Float64
        }
    }

    /// Lower-case name, matching the usual array-library spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Complex value with `f32` parts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(C)]
pub struct ComplexF32 {
    pub re: f32,
    pub im: f32,
}

/// Complex value with `f64` parts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(C)]
pub struct ComplexF64 {
    pub re: f64,
    pub im: f64,
}

impl ComplexF64 {
    /// Creates a complex value.
    #[must_use]
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

impl From<ComplexF32> for ComplexF64 {
    fn from(value: ComplexF32) -> Self {
        Self {
            re: f64::from(value.re),
            im: f64::from(value.im),
        }
    }
}

/// Lossy widening of real element types to `f64`.
pub trait RealElement: Copy {
    fn to_f64(self) -> f64;
}

macro_rules! impl_real_element {
    ($($t:ty),*) => {
        $(
            impl RealElement for $t {
                #[inline]
                #[allow(clippy::cast_precision_loss, clippy::cast_lossless)]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_real_element!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

/// An n-dimensional array of one of the supported element types.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray<D: Dimension> {
    UInt8(Array<u8, D>),
    UInt16(Array<u16, D>),
    UInt32(Array<u32, D>),
    UInt64(Array<u64, D>),
    Int8(Array<i8, D>),
    Int16(Array<i16, D>),
    Int32(Array<i32, D>),
    Int64(Array<i64, D>),
    Float32(Array<f32, D>),
    Float64(Array<f64, D>),
    Complex64(Array<ComplexF32, D>),
    Complex128(Array<ComplexF64, D>),
}

/// A 2D image payload, indexed `[row, col]`.
pub type PixelData = TypedArray<Ix2>;

/// A 3D stack payload, indexed `[slice, row, col]`.
pub type StackData = TypedArray<Ix3>;

/// Evaluates `$body` with `$arr` bound to the inner array of any variant.
#[macro_export]
macro_rules! with_typed_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            $crate::TypedArray::UInt8($arr) => $body,
            $crate::TypedArray::UInt16($arr) => $body,
            $crate::TypedArray::UInt32($arr) => $body,
            $crate::TypedArray::UInt64($arr) => $body,
            $crate::TypedArray::Int8($arr) => $body,
            $crate::TypedArray::Int16($arr) => $body,
            $crate::TypedArray::Int32($arr) => $body,
            $crate::TypedArray::Int64($arr) => $body,
            $crate::TypedArray::Float32($arr) => $body,
            $crate::TypedArray::Float64($arr) => $body,
            $crate::TypedArray::Complex64($arr) => $body,
            $crate::TypedArray::Complex128($arr) => $body,
        }
    };
}

impl<D: Dimension> TypedArray<D> {
    /// Allocates a zero-filled array of the given type and shape.
    #[must_use]
    pub fn zeros(element_type: ElementType, shape: D) -> Self {
        match element_type {
            ElementType::UInt8 => Self::UInt8(Array::default(shape)),
            ElementType::UInt16 => Self::UInt16(Array::default(shape)),
            ElementType::UInt32 => Self::UInt32(Array::default(shape)),
            ElementType::UInt64 => Self::UInt64(Array::default(shape)),
            ElementType::Int8 => Self::Int8(Array::default(shape)),
            ElementType::Int16 => Self::Int16(Array::default(shape)),
            ElementType::Int32 => Self::Int32(Array::default(shape)),
            ElementType::Int64 => Self::Int64(Array::default(shape)),
            ElementType::Float32 => Self::Float32(Array::default(shape)),
            ElementType::Float64 => Self::Float64(Array::default(shape)),
            ElementType::Complex64 => Self::Complex64(Array::default(shape)),
            ElementType::Complex128 => Self::Complex128(Array::default(shape)),
        }
    }

    /// Element type of the payload.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::UInt8(_) => ElementType::UInt8,
            Self::UInt16(_) => ElementType::UInt16,
            Self::UInt32(_) => ElementType::UInt32,
            Self::UInt64(_) => ElementType::UInt64,
            Self::Int8(_) => ElementType::Int8,
            Self::Int16(_) => ElementType::Int16,
            Self::Int32(_) => ElementType::Int32,
            Self::Int64(_) => ElementType::Int64,
            Self::Float32(_) => ElementType::Float32,
            Self::Float64(_) => ElementType::Float64,
            Self::Complex64(_) => ElementType::Complex64,
            Self::Complex128(_) => ElementType::Complex128,
        }
    }

    /// Extent of every axis.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        with_typed_array!(self, arr => arr.shape())
    }

    /// Total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        with_typed_array!(self, arr => arr.len())
    }

    /// Returns true if the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PixelData {
    /// Number of rows (first axis).
    #[must_use]
    pub fn rows(&self) -> usize {
        self.shape()[0]
    }

    /// Number of columns (second axis).
    #[must_use]
    pub fn cols(&self) -> usize {
        self.shape()[1]
    }
}

impl StackData {
    /// Allocates a zero-filled stack of `slices` images of `rows` x `cols`.
    #[must_use]
    pub fn for_slices(element_type: ElementType, slices: usize, rows: usize, cols: usize) -> Self {
        Self::zeros(element_type, Dim([slices, rows, cols]))
    }

    /// Copies `image` into slice `index`.
    ///
    /// # Errors
    /// Returns an error if the element types differ, the index is outside the
    /// stack, or the image shape differs from the slice shape.
    pub fn assign_slice(&mut self, index: usize, image: &PixelData) -> Result<()> {
        match (self, image) {
            (Self::UInt8(s), PixelData::UInt8(p)) => assign(s, index, p),
            (Self::UInt16(s), PixelData::UInt16(p)) => assign(s, index, p),
            (Self::UInt32(s), PixelData::UInt32(p)) => assign(s, index, p),
            (Self::UInt64(s), PixelData::UInt64(p)) => assign(s, index, p),
            (Self::Int8(s), PixelData::Int8(p)) => assign(s, index, p),
            (Self::Int16(s), PixelData::Int16(p)) => assign(s, index, p),
            (Self::Int32(s), PixelData::Int32(p)) => assign(s, index, p),
            (Self::Int64(s), PixelData::Int64(p)) => assign(s, index, p),
            (Self::Float32(s), PixelData::Float32(p)) => assign(s, index, p),
            (Self::Float64(s), PixelData::Float64(p)) => assign(s, index, p),
            (Self::Complex64(s), PixelData::Complex64(p)) => assign(s, index, p),
            (Self::Complex128(s), PixelData::Complex128(p)) => assign(s, index, p),
            (stack, image) => Err(Error::TypeMismatch {
                expected: stack.element_type(),
                actual: image.element_type(),
            }),
        }
    }
}

fn assign<T: Clone>(stack: &mut Array3<T>, index: usize, image: &Array2<T>) -> Result<()> {
    let (slices, rows, cols) = stack.dim();
    if index >= slices {
        return Err(Error::SliceOutOfRange { index, slices });
    }
    if image.dim() != (rows, cols) {
        return Err(Error::ShapeMismatch {
            expected: vec![rows, cols],
            actual: image.shape().to_vec(),
        });
    }
    stack.index_axis_mut(Axis(0), index).assign(image);
    Ok(())
}
