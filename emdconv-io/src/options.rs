//! Stack conversion options.

use crate::Result;
use emdconv_core::BinningFactor;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Knobs of the z-stack conversion. `Default` reproduces the classic tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackOptions {
    /// Block-mean factor applied to every slice and to the spatial axes.
    pub binning: BinningFactor,
    /// Sidecar field holding each slice's stage coordinate.
    pub stage_field: String,
    pub slice_axis_name: String,
    pub slice_axis_units: String,
    /// Units of the two spatial dimension vectors.
    pub spatial_units: String,
    /// Appended to the sidecar stem to name its data file.
    pub data_suffix: String,
    /// Sidecar extension, matched case-insensitively.
    pub sidecar_extension: String,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            binning: BinningFactor::ONE,
            stage_field: "Stage Z [um]".to_string(),
            slice_axis_name: "Stage Z".to_string(),
            slice_axis_units: "[um]".to_string(),
            spatial_units: "[m]".to_string(),
            data_suffix: "_1.ser".to_string(),
            sidecar_extension: "emi".to_string(),
        }
    }
}

impl StackOptions {
    /// Load options from a JSON file; absent keys keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load options from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
