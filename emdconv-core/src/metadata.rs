//! Decoded images and their acquisition metadata.

use crate::{CalibrationAxis, ElementType, Error, PixelData, Result};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A decoded 2D image. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    pixels: PixelData,
}

impl RawImage {
    #[must_use]
    pub fn new(pixels: PixelData) -> Self {
        Self { pixels }
    }

    /// The typed payload.
    #[must_use]
    pub fn pixels(&self) -> &PixelData {
        &self.pixels
    }

    #[must_use]
    pub fn element_type(&self) -> ElementType {
        self.pixels.element_type()
    }

    /// `(rows, cols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.pixels.rows(), self.pixels.cols())
    }
}

/// Value of an acquisition-specific field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Interprets `raw` as a number when possible, otherwise keeps the text.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(value) => Self::Number(value),
            Err(_) => Self::Text(trimmed.to_string()),
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Named acquisition fields (stage position, timestamps, ...).
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Metadata describing one decoded acquisition element.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AcquisitionMetadata {
    pub element_type: ElementType,
    /// `(rows, cols)`.
    pub shape: (usize, usize),
    /// Calibration along columns.
    pub x_axis: CalibrationAxis,
    /// Calibration along rows.
    pub y_axis: CalibrationAxis,
    pub fields: FieldMap,
}

impl AcquisitionMetadata {
    /// Looks up a field.
    ///
    /// # Errors
    /// Returns [`Error::MissingField`] if the field is absent.
    pub fn field(&self, name: &str) -> Result<&FieldValue> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::MissingField(name.to_string()))
    }

    /// Looks up a numeric field.
    ///
    /// # Errors
    /// Returns [`Error::MissingField`] if the field is absent and
    /// [`Error::InvalidField`] if it is not numeric.
    pub fn field_f64(&self, name: &str) -> Result<f64> {
        let value = self.field(name)?;
        value.as_f64().ok_or_else(|| Error::InvalidField {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn metadata() -> AcquisitionMetadata {
        let mut fields = FieldMap::new();
        fields.insert("Stage Z [um]".to_string(), FieldValue::parse("12.5"));
        fields.insert("Mode".to_string(), FieldValue::parse(" STEM "));
        AcquisitionMetadata {
            element_type: ElementType::UInt16,
            shape: (2, 3),
            x_axis: CalibrationAxis::pixels(3).unwrap(),
            y_axis: CalibrationAxis::pixels(2).unwrap(),
            fields,
        }
    }

    #[test]
    fn test_field_lookup() {
        let meta = metadata();
        assert_eq!(meta.field_f64("Stage Z [um]").unwrap(), 12.5);
        assert_eq!(
            meta.field("Mode").unwrap(),
            &FieldValue::Text("STEM".to_string())
        );
    }

    #[test]
    fn test_missing_field() {
        let err = metadata().field_f64("Stage X [um]").unwrap_err();
        assert_eq!(err, Error::MissingField("Stage X [um]".to_string()));
    }

    #[test]
    fn test_non_numeric_field() {
        let err = metadata().field_f64("Mode").unwrap_err();
        assert!(matches!(err, Error::InvalidField { .. }));
    }

    #[test]
    fn test_raw_image_shape() {
        let image = RawImage::new(PixelData::Float32(Array2::zeros((4, 5))));
        assert_eq!(image.shape(), (4, 5));
        assert_eq!(image.element_type(), ElementType::Float32);
    }
}
