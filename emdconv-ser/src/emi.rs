//! EMI sidecar metadata.
//!
//! The sidecar is a binary container with an embedded
//! `<ObjectInfo>...</ObjectInfo>` XML block. Leaf elements become fields
//! keyed by tag name; `<Data><Label/><Value/></Data>` entries are keyed by
//! their label.

use crate::{Error, Result};
use emdconv_core::{FieldMap, FieldValue};
use roxmltree::{Document, Node};

const OPEN_TAG: &[u8] = b"<ObjectInfo>";
const CLOSE_TAG: &[u8] = b"</ObjectInfo>";

/// Flattened sidecar fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmiMetadata {
    fields: FieldMap,
}

impl EmiMetadata {
    /// Extracts and flattens the `ObjectInfo` block.
    ///
    /// Stage coordinates are additionally exposed in display units:
    /// `Stage X [um]`, `Stage Y [um]`, `Stage Z [um]` from metres and
    /// `Stage A [deg]`, `Stage B [deg]` from radians.
    ///
    /// # Errors
    /// Returns [`Error::Sidecar`] if no `ObjectInfo` block is present and
    /// [`Error::Xml`] if it is malformed.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let start = find(bytes, OPEN_TAG)
            .ok_or_else(|| Error::Sidecar("no ObjectInfo block".to_string()))?;
        let end = find(&bytes[start..], CLOSE_TAG)
            .map(|pos| start + pos + CLOSE_TAG.len())
            .ok_or_else(|| Error::Sidecar("unterminated ObjectInfo block".to_string()))?;

        let text = String::from_utf8_lossy(&bytes[start..end]);
        let doc = Document::parse(&text)?;

        let mut fields = FieldMap::new();
        for node in doc.root_element().descendants().filter(Node::is_element) {
            if node.has_tag_name("Data") {
                if let (Some(label), Some(value)) =
                    (child_text(node, "Label"), child_text(node, "Value"))
                {
                    if !label.is_empty() {
                        fields
                            .entry(label.to_string())
                            .or_insert_with(|| FieldValue::parse(value));
                    }
                }
                continue;
            }
            if node
                .parent_element()
                .is_some_and(|parent| parent.has_tag_name("Data"))
            {
                continue;
            }
            if node.children().any(|child| child.is_element()) {
                continue;
            }
            let value = node.text().map_or("", str::trim);
            if value.is_empty() {
                continue;
            }
            fields
                .entry(node.tag_name().name().to_string())
                .or_insert_with(|| FieldValue::parse(value));
        }

        for axis in ["X", "Y", "Z"] {
            derive_stage_field(&mut fields, axis, "[um]", |metres| metres * 1.0e6);
        }
        for axis in ["A", "B"] {
            derive_stage_field(&mut fields, axis, "[deg]", f64::to_degrees);
        }

        log::debug!("parsed {} sidecar fields", fields.len());
        Ok(Self { fields })
    }

    #[must_use]
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|child| child.has_tag_name(name))
        .map(|child| child.text().map_or("", str::trim))
}

fn derive_stage_field(fields: &mut FieldMap, axis: &str, unit: &str, convert: fn(f64) -> f64) {
    let target = format!("Stage {axis} {unit}");
    if fields.contains_key(&target) {
        return;
    }
    let source = [format!("Stage{axis}"), format!("Stage {axis}")]
        .iter()
        .find_map(|key| fields.get(key).and_then(FieldValue::as_f64));
    if let Some(value) = source {
        fields.insert(target, FieldValue::Number(convert(value)));
    }
}
