//! Per-element tags: acquisition time and optional stage position.

use crate::cursor::ByteReader;
use crate::header::{TAG_TYPE_TIME, TAG_TYPE_TIME_POSITION};
use crate::{Error, Result, SerHeader};
use emdconv_core::{FieldMap, FieldValue};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tag attached to a data element.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ElementTag {
    pub tag_type_id: u16,
    /// Seconds since the Unix epoch.
    pub time: u32,
    /// `(x, y)` when the tag type carries a position.
    pub position: Option<(f64, f64)>,
}

impl ElementTag {
    /// Tag contents as named fields.
    #[must_use]
    pub fn fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("Time".to_string(), FieldValue::Number(f64::from(self.time)));
        if let Some((x, y)) = self.position {
            fields.insert("PositionX".to_string(), FieldValue::Number(x));
            fields.insert("PositionY".to_string(), FieldValue::Number(y));
        }
        fields
    }
}

/// Reads the tag of element `index`. A zero tag offset means no tag.
///
/// # Errors
/// Returns [`Error::Format`] for an unknown tag type and
/// [`Error::Truncated`] if the tag runs past the end of the file.
pub fn read_tag(data: &[u8], header: &SerHeader, index: usize) -> Result<Option<ElementTag>> {
    let offset = header.tag_offset(index)?;
    if offset == 0 {
        return Ok(None);
    }
    let mut reader = ByteReader::at(data, offset, "tag")?;
    let tag_type_id = reader.u16("tag")?;
    reader.take(2, "tag")?;
    let time = reader.u32("tag")?;

    let position = match u32::from(tag_type_id) {
        TAG_TYPE_TIME => None,
        TAG_TYPE_TIME_POSITION => Some((reader.f64("tag")?, reader.f64("tag")?)),
        other => return Err(Error::Format(format!("unknown tag type {other:#06x}"))),
    };
    log::trace!(
        "tag {index} at {offset}: type {tag_type_id:#06x}, {} bytes",
        reader.position() - offset
    );

    Ok(Some(ElementTag {
        tag_type_id,
        time,
        position,
    }))
}
