//! 2D data elements.
//!
//! Each element starts with a 50-byte header:
//!
//! | field          | type |
//! |----------------|------|
//! | CalibrationX   | f64 offset, f64 delta, i32 element |
//! | CalibrationY   | f64 offset, f64 delta, i32 element |
//! | DataType       | u16  |
//! | ArraySizeX     | u32  |
//! | ArraySizeY     | u32  |
//!
//! The payload follows with X varying fastest, i.e. row-major `(Y, X)`.

use crate::cursor::ByteReader;
use crate::{Error, Result, SerHeader};
use emdconv_core::{CalibrationAxis, ComplexF32, ComplexF64, ElementType, PixelData};
use ndarray::Array2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of the element header preceding the payload.
pub const ELEMENT_HEADER_LEN: usize = 50;

/// Maps a SER `DataType` code to an element type.
///
/// # Errors
/// Returns [`Error::UnsupportedType`] for codes outside `1..=10`.
pub fn element_type_from_code(code: u16) -> Result<ElementType> {
    Ok(match code {
        1 => ElementType::UInt8,
        2 => ElementType::UInt16,
        3 => ElementType::UInt32,
        4 => ElementType::Int8,
        5 => ElementType::Int16,
        6 => ElementType::Int32,
        7 => ElementType::Float32,
        8 => ElementType::Float64,
        9 => ElementType::Complex64,
        10 => ElementType::Complex128,
        other => return Err(Error::UnsupportedType(other)),
    })
}

/// SER `DataType` code of an element type; 64-bit integers have none.
#[must_use]
pub fn element_type_code(element_type: ElementType) -> Option<u16> {
    match element_type {
        ElementType::UInt8 => Some(1),
        ElementType::UInt16 => Some(2),
        ElementType::UInt32 => Some(3),
        ElementType::Int8 => Some(4),
        ElementType::Int16 => Some(5),
        ElementType::Int32 => Some(6),
        ElementType::Float32 => Some(7),
        ElementType::Float64 => Some(8),
        ElementType::Complex64 => Some(9),
        ElementType::Complex128 => Some(10),
        ElementType::UInt64 | ElementType::Int64 => None,
    }
}

/// Per-axis calibration stored in an element header.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ElementCalibration {
    pub offset: f64,
    pub delta: f64,
    pub element: i32,
}

impl Default for ElementCalibration {
    fn default() -> Self {
        Self {
            offset: 0.0,
            delta: 1.0,
            element: 0,
        }
    }
}

impl ElementCalibration {
    /// Calibration axis covering `length` elements.
    ///
    /// # Errors
    /// Returns a core error if `length` is zero.
    pub fn to_axis(&self, length: usize) -> Result<CalibrationAxis> {
        Ok(CalibrationAxis::new(
            self.offset,
            self.delta,
            i64::from(self.element),
            length,
        )?)
    }
}

/// Parsed element header.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageElementHeader {
    pub calibration_x: ElementCalibration,
    pub calibration_y: ElementCalibration,
    pub type_code: u16,
    pub element_type: ElementType,
    /// `ArraySizeX`: number of columns.
    pub width: u32,
    /// `ArraySizeY`: number of rows.
    pub height: u32,
}

impl ImageElementHeader {
    /// `(rows, cols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.height as usize, self.width as usize)
    }

    fn payload_len(&self) -> Result<usize> {
        let (rows, cols) = self.shape();
        rows.checked_mul(cols)
            .and_then(|n| n.checked_mul(self.element_type.size_bytes()))
            .ok_or_else(|| {
                Error::Format(format!(
                    "element of {cols}x{rows} {} overflows",
                    self.element_type
                ))
            })
    }
}

/// A decoded image element.
#[derive(Debug, Clone, PartialEq)]
pub struct SerImage {
    pub header: ImageElementHeader,
    pub pixels: PixelData,
}

fn read_calibration(reader: &mut ByteReader<'_>) -> Result<ElementCalibration> {
    Ok(ElementCalibration {
        offset: reader.f64("element header")?,
        delta: reader.f64("element header")?,
        element: reader.i32("element header")?,
    })
}

fn element_reader<'a>(
    data: &'a [u8],
    header: &SerHeader,
    index: usize,
) -> Result<(ByteReader<'a>, ImageElementHeader)> {
    header.ensure_single_image()?;
    let mut reader = ByteReader::at(data, header.data_offset(index)?, "element header")?;

    let calibration_x = read_calibration(&mut reader)?;
    let calibration_y = read_calibration(&mut reader)?;
    let type_code = reader.u16("element header")?;
    let element_type = element_type_from_code(type_code)?;
    let width = reader.u32("element header")?;
    let height = reader.u32("element header")?;
    if width == 0 || height == 0 {
        return Err(Error::Format(format!("empty {width}x{height} image element")));
    }

    Ok((
        reader,
        ImageElementHeader {
            calibration_x,
            calibration_y,
            type_code,
            element_type,
            width,
            height,
        },
    ))
}

/// Reads only the header of element `index`.
///
/// # Errors
/// Returns [`Error::Format`] unless the series holds exactly one 2D image,
/// [`Error::UnsupportedType`] for unknown type codes and
/// [`Error::Truncated`] if the header runs past the end of the file.
pub fn read_element_header(
    data: &[u8],
    header: &SerHeader,
    index: usize,
) -> Result<ImageElementHeader> {
    element_reader(data, header, index).map(|(_, element)| element)
}

/// Element type of element `index` without decoding its payload.
///
/// # Errors
/// See [`read_element_header`].
pub fn read_element_type(data: &[u8], header: &SerHeader, index: usize) -> Result<ElementType> {
    read_element_header(data, header, index).map(|element| element.element_type)
}

/// Decodes element `index` into a typed `(rows, cols)` array.
///
/// # Errors
/// See [`read_element_header`]; a short payload is [`Error::Truncated`].
pub fn read_image(data: &[u8], header: &SerHeader, index: usize) -> Result<SerImage> {
    let (mut reader, element) = element_reader(data, header, index)?;
    let payload = reader.take(element.payload_len()?, "element payload")?;
    let pixels = decode_pixels(payload, element.element_type, element.shape())?;
    Ok(SerImage {
        header: element,
        pixels,
    })
}

fn decode_values<T, const N: usize>(bytes: &[u8], from_le: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            from_le(buf)
        })
        .collect()
}

fn to_array<T>(values: Vec<T>, shape: (usize, usize)) -> Result<Array2<T>> {
    Array2::from_shape_vec(shape, values)
        .map_err(|e| Error::Format(format!("payload does not fill {shape:?}: {e}")))
}

fn decode_pixels(
    payload: &[u8],
    element_type: ElementType,
    shape: (usize, usize),
) -> Result<PixelData> {
    Ok(match element_type {
        ElementType::UInt8 => PixelData::UInt8(to_array(payload.to_vec(), shape)?),
        ElementType::UInt16 => {
            PixelData::UInt16(to_array(decode_values(payload, u16::from_le_bytes), shape)?)
        }
        ElementType::UInt32 => {
            PixelData::UInt32(to_array(decode_values(payload, u32::from_le_bytes), shape)?)
        }
        ElementType::UInt64 => {
            PixelData::UInt64(to_array(decode_values(payload, u64::from_le_bytes), shape)?)
        }
        ElementType::Int8 => {
            PixelData::Int8(to_array(decode_values(payload, i8::from_le_bytes), shape)?)
        }
        ElementType::Int16 => {
            PixelData::Int16(to_array(decode_values(payload, i16::from_le_bytes), shape)?)
        }
        ElementType::Int32 => {
            PixelData::Int32(to_array(decode_values(payload, i32::from_le_bytes), shape)?)
        }
        ElementType::Int64 => {
            PixelData::Int64(to_array(decode_values(payload, i64::from_le_bytes), shape)?)
        }
        ElementType::Float32 => {
            PixelData::Float32(to_array(decode_values(payload, f32::from_le_bytes), shape)?)
        }
        ElementType::Float64 => {
            PixelData::Float64(to_array(decode_values(payload, f64::from_le_bytes), shape)?)
        }
        ElementType::Complex64 => {
            let parts = decode_values(payload, f32::from_le_bytes);
            let values = parts
                .chunks_exact(2)
                .map(|pair| ComplexF32 {
                    re: pair[0],
                    im: pair[1],
                })
                .collect();
            PixelData::Complex64(to_array(values, shape)?)
        }
        ElementType::Complex128 => {
            let parts = decode_values(payload, f64::from_le_bytes);
            let values = parts
                .chunks_exact(2)
                .map(|pair| ComplexF64::new(pair[0], pair[1]))
                .collect();
            PixelData::Complex128(to_array(values, shape)?)
        }
    })
}
