//! emdconv-ser: decoder for TIA SER series files and their EMI sidecars.
//!
//! # Key Components
//!
//! - [`SerHeader`] - Series header, dimension descriptors and offset arrays
//! - [`read_image`] - Decodes a 2D data element into a typed array
//! - [`read_tag`] - Acquisition time and stage position of an element
//! - [`EmiMetadata`] - Flattened `ObjectInfo` fields from the sidecar
//! - [`decode_acquisition`] - All of the above as core types
//!
//! Only single-image series (`DataTypeID == 0x4122`, one valid element)
//! are decoded; any other layout is reported as [`Error::Format`].

mod cursor;
pub mod element;
pub mod emi;
pub mod encode;
mod error;
pub mod header;
pub mod tag;

pub use element::{
    element_type_code, element_type_from_code, read_element_header, read_element_type,
    read_image, ElementCalibration, ImageElementHeader, SerImage,
};
pub use emi::EmiMetadata;
pub use error::{Error, Result};
pub use header::{SerHeader, SeriesDimension};
pub use tag::{read_tag, ElementTag};

use emdconv_core::{AcquisitionMetadata, FieldMap, RawImage};

/// Decodes element `index` together with its tag and sidecar fields.
///
/// Tag fields (`Time`, `PositionX`, `PositionY`) are merged with the
/// sidecar fields; sidecar values win on a name clash. An unreadable tag, or
/// one whose type differs from the header's, is logged and skipped.
///
/// # Errors
/// Propagates image decoder errors; see [`read_image`].
pub fn decode_acquisition(
    data: &[u8],
    header: &SerHeader,
    index: usize,
    sidecar: Option<&EmiMetadata>,
) -> Result<(RawImage, AcquisitionMetadata)> {
    let image = read_image(data, header, index)?;
    let (rows, cols) = image.header.shape();

    let mut fields = tag_fields(data, header, index);
    if let Some(sidecar) = sidecar {
        fields.extend(
            sidecar
                .fields()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
    }

    let metadata = AcquisitionMetadata {
        element_type: image.header.element_type,
        shape: (rows, cols),
        x_axis: image.header.calibration_x.to_axis(cols)?,
        y_axis: image.header.calibration_y.to_axis(rows)?,
        fields,
    };
    Ok((RawImage::new(image.pixels), metadata))
}

fn tag_fields(data: &[u8], header: &SerHeader, index: usize) -> FieldMap {
    match read_tag(data, header, index) {
        Ok(Some(tag)) if u32::from(tag.tag_type_id) == header.tag_type_id => tag.fields(),
        Ok(Some(tag)) => {
            log::warn!(
                "element {index}: tag type {:#06x} differs from series tag type {:#06x}, ignoring tag",
                tag.tag_type_id,
                header.tag_type_id
            );
            FieldMap::new()
        }
        Ok(None) => FieldMap::new(),
        Err(e) => {
            log::warn!("element {index}: ignoring unreadable tag ({e})");
            FieldMap::new()
        }
    }
}
