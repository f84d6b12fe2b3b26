//! SER series header.
//!
//! Layout (little-endian):
//!
//! | field               | type      |
//! |---------------------|-----------|
//! | ByteOrder           | u16       |
//! | SeriesID            | u16       |
//! | SeriesVersion       | u16       |
//! | DataTypeID          | u32       |
//! | TagTypeID           | u32       |
//! | TotalNumberElements | u32       |
//! | ValidNumberElements | u32       |
//! | OffsetArrayOffset   | u32 / u64 |
//! | NumberDimensions    | u32       |
//!
//! followed by the series dimension descriptors. The data and tag offset
//! arrays live at `OffsetArrayOffset`.

use crate::cursor::{to_usize, ByteReader};
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `II`: little-endian byte order marker.
pub const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;
/// Series identifier of TIA series files.
pub const SERIES_ID: u16 = 0x0197;
/// Series version with 32-bit offsets.
pub const SERIES_VERSION_32: u16 = 0x0210;
/// Series version with 64-bit offsets.
pub const SERIES_VERSION_64: u16 = 0x0220;
/// Elements are 1D spectra.
pub const DATA_TYPE_1D: u32 = 0x4120;
/// Elements are 2D images.
pub const DATA_TYPE_2D: u32 = 0x4122;
/// Tags carry a timestamp only.
pub const TAG_TYPE_TIME: u32 = 0x4152;
/// Tags carry a timestamp and a 2D position.
pub const TAG_TYPE_TIME_POSITION: u32 = 0x4142;

/// One series dimension descriptor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeriesDimension {
    pub size: u32,
    pub calibration_offset: f64,
    pub calibration_delta: f64,
    pub calibration_element: i32,
    pub description: String,
    pub units: String,
}

/// Parsed SER series header with its offset arrays.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SerHeader {
    pub byte_order: u16,
    pub series_id: u16,
    pub series_version: u16,
    pub data_type_id: u32,
    pub tag_type_id: u32,
    pub total_elements: u32,
    pub valid_elements: u32,
    pub offset_array_offset: u64,
    pub dimensions: Vec<SeriesDimension>,
    pub data_offsets: Vec<u64>,
    pub tag_offsets: Vec<u64>,
}

impl SerHeader {
    /// Parses the header, dimension descriptors and offset arrays.
    ///
    /// The element layout is not enforced here so that any series can be
    /// inspected; see [`SerHeader::ensure_single_image`].
    ///
    /// # Errors
    /// Returns [`Error::Format`] for a wrong byte order, series id or version
    /// and [`Error::Truncated`] if the file ends early or a valid element
    /// points past its end.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::at(data, 0, "series header")?;

        let byte_order = reader.u16("series header")?;
        if byte_order != BYTE_ORDER_LITTLE_ENDIAN {
            return Err(Error::Format(format!(
                "unexpected byte order marker {byte_order:#06x}"
            )));
        }
        let series_id = reader.u16("series header")?;
        if series_id != SERIES_ID {
            return Err(Error::Format(format!(
                "unexpected series id {series_id:#06x}"
            )));
        }
        let series_version = reader.u16("series header")?;
        let wide = match series_version {
            SERIES_VERSION_32 => false,
            SERIES_VERSION_64 => true,
            other => {
                return Err(Error::Format(format!(
                    "unsupported series version {other:#06x}"
                )))
            }
        };

        let data_type_id = reader.u32("series header")?;
        let tag_type_id = reader.u32("series header")?;
        let total_elements = reader.u32("series header")?;
        let valid_elements = reader.u32("series header")?;
        let offset_array_offset = reader.offset(wide, "series header")?;
        let dimension_count = reader.u32("series header")?;

        if valid_elements > total_elements {
            return Err(Error::Format(format!(
                "{valid_elements} valid elements exceed {total_elements} total elements"
            )));
        }

        let mut dimensions = Vec::new();
        for _ in 0..dimension_count {
            dimensions.push(SeriesDimension {
                size: reader.u32("dimension descriptor")?,
                calibration_offset: reader.f64("dimension descriptor")?,
                calibration_delta: reader.f64("dimension descriptor")?,
                calibration_element: reader.i32("dimension descriptor")?,
                description: reader.string("dimension descriptor")?,
                units: reader.string("dimension descriptor")?,
            });
        }

        let total = to_usize(u64::from(total_elements), "offset array")?;
        let width = if wide { 8 } else { 4 };
        let mut reader = ByteReader::at(
            data,
            to_usize(offset_array_offset, "offset array")?,
            "offset array",
        )?;
        let needed = total
            .checked_mul(2 * width)
            .ok_or_else(|| Error::Format("offset array size overflows".to_string()))?;
        if needed > reader.remaining() {
            return Err(Error::Truncated {
                what: "offset array",
                needed,
                available: reader.remaining(),
            });
        }

        let mut data_offsets = Vec::with_capacity(total);
        for _ in 0..total {
            data_offsets.push(reader.offset(wide, "offset array")?);
        }
        let mut tag_offsets = Vec::with_capacity(total);
        for _ in 0..total {
            tag_offsets.push(reader.offset(wide, "offset array")?);
        }

        let header = Self {
            byte_order,
            series_id,
            series_version,
            data_type_id,
            tag_type_id,
            total_elements,
            valid_elements,
            offset_array_offset,
            dimensions,
            data_offsets,
            tag_offsets,
        };
        header.check_offsets(data.len())?;
        Ok(header)
    }

    fn check_offsets(&self, file_len: usize) -> Result<()> {
        let valid = self.valid_count();
        for &offset in self.data_offsets.iter().take(valid) {
            let offset = to_usize(offset, "data offset")?;
            if offset >= file_len {
                return Err(Error::Truncated {
                    what: "data element",
                    needed: offset,
                    available: file_len,
                });
            }
        }
        for &offset in self.tag_offsets.iter().take(valid) {
            let offset = to_usize(offset, "tag offset")?;
            if offset >= file_len {
                return Err(Error::Truncated {
                    what: "tag",
                    needed: offset,
                    available: file_len,
                });
            }
        }
        Ok(())
    }

    fn valid_count(&self) -> usize {
        usize::try_from(self.valid_elements).unwrap_or(usize::MAX)
    }

    /// Returns true if offsets are stored as 64-bit values.
    #[must_use]
    pub fn uses_wide_offsets(&self) -> bool {
        self.series_version == SERIES_VERSION_64
    }

    /// Returns true for a series holding exactly one valid 2D image.
    #[must_use]
    pub fn is_single_image(&self) -> bool {
        self.data_type_id == DATA_TYPE_2D && self.valid_elements == 1
    }

    /// Requires the single-image layout.
    ///
    /// # Errors
    /// Returns [`Error::Format`] for any other data type or element count.
    pub fn ensure_single_image(&self) -> Result<()> {
        if self.data_type_id != DATA_TYPE_2D {
            return Err(Error::Format(format!(
                "data type id {:#06x} is not a 2D image series ({DATA_TYPE_2D:#06x})",
                self.data_type_id
            )));
        }
        if self.valid_elements != 1 {
            return Err(Error::Format(format!(
                "expected exactly 1 valid element, found {}",
                self.valid_elements
            )));
        }
        Ok(())
    }

    /// Byte offset of valid element `index`.
    ///
    /// # Errors
    /// Returns [`Error::Format`] if `index` is not a valid element.
    pub fn data_offset(&self, index: usize) -> Result<usize> {
        self.offset_of(&self.data_offsets, index, "data offset")
    }

    /// Byte offset of the tag of valid element `index`; zero means no tag.
    ///
    /// # Errors
    /// Returns [`Error::Format`] if `index` is not a valid element.
    pub fn tag_offset(&self, index: usize) -> Result<usize> {
        self.offset_of(&self.tag_offsets, index, "tag offset")
    }

    fn offset_of(&self, offsets: &[u64], index: usize, what: &'static str) -> Result<usize> {
        if index >= self.valid_count() {
            return Err(Error::Format(format!(
                "element index {index} out of range ({} valid elements)",
                self.valid_elements
            )));
        }
        let offset = offsets
            .get(index)
            .copied()
            .ok_or_else(|| Error::Format(format!("missing {what} for element {index}")))?;
        to_usize(offset, what)
    }
}
