//! Writers for synthetic SER/EMI acquisitions.
//!
//! Produces files in the same layout the decoder reads; used to build test
//! fixtures and demo batches without instrument data.

use crate::element::{element_type_code, ElementCalibration, ELEMENT_HEADER_LEN};
use crate::header::{
    BYTE_ORDER_LITTLE_ENDIAN, DATA_TYPE_2D, SERIES_ID, SERIES_VERSION_32, SERIES_VERSION_64,
    TAG_TYPE_TIME, TAG_TYPE_TIME_POSITION,
};
use crate::{Error, Result};
use emdconv_core::{with_typed_array, ComplexF32, ComplexF64, PixelData};

trait LeBytes {
    fn put(&self, out: &mut Vec<u8>);
}

macro_rules! impl_le_bytes {
    ($($t:ty),*) => {
        $(
            impl LeBytes for $t {
                fn put(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_le_bytes!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl LeBytes for ComplexF32 {
    fn put(&self, out: &mut Vec<u8>) {
        self.re.put(out);
        self.im.put(out);
    }
}

impl LeBytes for ComplexF64 {
    fn put(&self, out: &mut Vec<u8>) {
        self.re.put(out);
        self.im.put(out);
    }
}

/// Encodes one image as a single-element SER series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SerEncoder {
    pub series_version: u16,
    pub data_type_id: u32,
    pub tag_type_id: u32,
    /// Overrides `ValidNumberElements`; every slot points at the same image.
    pub valid_elements: Option<u32>,
    /// Overrides the element `DataType` code.
    pub type_code: Option<u16>,
    pub time: u32,
    /// Written when `tag_type_id` carries a position.
    pub position: (f64, f64),
}

impl Default for SerEncoder {
    fn default() -> Self {
        Self {
            series_version: SERIES_VERSION_32,
            data_type_id: DATA_TYPE_2D,
            tag_type_id: TAG_TYPE_TIME,
            valid_elements: None,
            type_code: None,
            time: 0,
            position: (0.0, 0.0),
        }
    }
}

impl SerEncoder {
    /// Serializes `pixels` with the given column (`x`) and row (`y`)
    /// calibrations.
    ///
    /// # Errors
    /// Returns [`Error::Format`] for element types without a SER code,
    /// unsupported series versions or images too large for the format.
    pub fn encode_image(
        &self,
        pixels: &PixelData,
        x: ElementCalibration,
        y: ElementCalibration,
    ) -> Result<Vec<u8>> {
        let wide = match self.series_version {
            SERIES_VERSION_32 => false,
            SERIES_VERSION_64 => true,
            other => {
                return Err(Error::Format(format!(
                    "unsupported series version {other:#06x}"
                )))
            }
        };
        let type_code = self
            .type_code
            .or_else(|| element_type_code(pixels.element_type()))
            .ok_or_else(|| {
                Error::Format(format!("{} has no SER type code", pixels.element_type()))
            })?;
        let width = u32::try_from(pixels.cols())
            .map_err(|_| Error::Format("image too wide".to_string()))?;
        let height = u32::try_from(pixels.rows())
            .map_err(|_| Error::Format("image too tall".to_string()))?;
        let valid = self.valid_elements.unwrap_or(1);
        let total = valid.max(1);

        let mut out = Vec::new();
        BYTE_ORDER_LITTLE_ENDIAN.put(&mut out);
        SERIES_ID.put(&mut out);
        self.series_version.put(&mut out);
        self.data_type_id.put(&mut out);
        self.tag_type_id.put(&mut out);
        total.put(&mut out);
        valid.put(&mut out);
        let offset_array_field = out.len();
        put_offset(&mut out, wide, 0);
        1u32.put(&mut out);

        // Series dimension: one calibrated "Number" axis.
        total.put(&mut out);
        0.0f64.put(&mut out);
        1.0f64.put(&mut out);
        0i32.put(&mut out);
        put_string(&mut out, "Number");
        put_string(&mut out, "");

        let offset_array = out.len() as u64;
        let offset_width: u64 = if wide { 8 } else { 4 };
        let element_offset = offset_array + 2 * u64::from(total) * offset_width;
        let payload_len = (pixels.len() * pixels.element_type().size_bytes()) as u64;
        let tag_offset = element_offset + ELEMENT_HEADER_LEN as u64 + payload_len;

        patch_offset(&mut out, offset_array_field, wide, offset_array);
        for _ in 0..total {
            put_offset(&mut out, wide, element_offset);
        }
        for _ in 0..total {
            put_offset(&mut out, wide, tag_offset);
        }

        for calibration in [x, y] {
            calibration.offset.put(&mut out);
            calibration.delta.put(&mut out);
            calibration.element.put(&mut out);
        }
        type_code.put(&mut out);
        width.put(&mut out);
        height.put(&mut out);
        with_typed_array!(pixels, arr => arr.iter().for_each(|value| value.put(&mut out)));

        let tag_type = u16::try_from(self.tag_type_id)
            .map_err(|_| Error::Format(format!("tag type {:#x} too wide", self.tag_type_id)))?;
        tag_type.put(&mut out);
        0u16.put(&mut out);
        self.time.put(&mut out);
        if self.tag_type_id == TAG_TYPE_TIME_POSITION {
            self.position.0.put(&mut out);
            self.position.1.put(&mut out);
        }

        Ok(out)
    }
}

fn put_offset(out: &mut Vec<u8>, wide: bool, value: u64) {
    if wide {
        value.put(out);
    } else {
        // Synthetic files stay far below 4 GiB.
        #[allow(clippy::cast_possible_truncation)]
        (value as u32).put(out);
    }
}

fn patch_offset(out: &mut [u8], at: usize, wide: bool, value: u64) {
    let mut bytes = Vec::with_capacity(8);
    put_offset(&mut bytes, wide, value);
    out[at..at + bytes.len()].copy_from_slice(&bytes);
}

fn put_string(out: &mut Vec<u8>, text: &str) {
    #[allow(clippy::cast_possible_truncation)]
    (text.len() as u32).put(out);
    out.extend_from_slice(text.as_bytes());
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Builds an EMI sidecar with an embedded `ObjectInfo` block.
#[derive(Debug, Clone, Default)]
pub struct EmiEncoder {
    leaves: Vec<(String, String)>,
    data: Vec<(String, String)>,
}

impl EmiEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plain `<name>value</name>` element.
    #[must_use]
    pub fn leaf(mut self, name: &str, value: &str) -> Self {
        self.leaves.push((name.to_string(), value.to_string()));
        self
    }

    /// Adds a labelled `<Data>` entry.
    #[must_use]
    pub fn data(mut self, label: &str, value: &str) -> Self {
        self.data.push((label.to_string(), value.to_string()));
        self
    }

    /// Sidecar bytes: binary preamble, XML block, binary trailer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut xml = String::from("<ObjectInfo><ExperimentalConditions><MicroscopeConditions>");
        for (name, value) in &self.leaves {
            xml.push_str(&format!("<{name}>{}</{name}>", escape(value)));
        }
        xml.push_str("</MicroscopeConditions></ExperimentalConditions>");
        xml.push_str("<ExperimentalDescription><Root>");
        for (label, value) in &self.data {
            xml.push_str(&format!(
                "<Data><Label>{}</Label><Value>{}</Value><Unit></Unit></Data>",
                escape(label),
                escape(value)
            ));
        }
        xml.push_str("</Root></ExperimentalDescription></ObjectInfo>");

        let mut out = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0x00, 0xFF];
        out.extend_from_slice(xml.as_bytes());
        out.extend_from_slice(&[0x00, 0xFE, 0xFF, 0x00]);
        out
    }
}
