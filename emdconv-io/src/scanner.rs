//! Batch discovery and validation for z-stack conversion.
//!
//! A batch is a directory of sidecar/data pairs. The data file of sidecar
//! `<stem>.emi` is `<stem><suffix>` (`_1.ser` by default). Pairs are
//! processed in ascending byte order of the sidecar file name.

use crate::reader::SerFileReader;
use crate::{Error, Result};
use emdconv_core::ElementType;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// File names of one acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedNames {
    pub sidecar: String,
    pub data: String,
}

/// Resolved paths of one acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionPair {
    pub sidecar: PathBuf,
    pub data: PathBuf,
}

/// Pairs sidecar names with their data file names.
///
/// Only names whose extension equals `sidecar_extension` (ASCII
/// case-insensitive) are candidates. The result is sorted by sidecar name;
/// whether the data files exist is not checked.
#[must_use]
pub fn pair_acquisitions<S: AsRef<str>>(
    names: &[S],
    sidecar_extension: &str,
    data_suffix: &str,
) -> Vec<PairedNames> {
    let mut pairs: Vec<PairedNames> = names
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|name| {
            let path = Path::new(name);
            let extension = path.extension()?.to_str()?;
            if !extension.eq_ignore_ascii_case(sidecar_extension) {
                return None;
            }
            let stem = path.file_stem()?.to_str()?;
            Some(PairedNames {
                sidecar: name.to_string(),
                data: format!("{stem}{data_suffix}"),
            })
        })
        .collect();
    pairs.sort_by(|a, b| a.sidecar.cmp(&b.sidecar));
    pairs
}

/// Lists `dir` and resolves its acquisition pairs.
///
/// # Errors
/// Returns [`Error::EmptyBatch`] if no sidecar is found and
/// [`Error::MissingCompanion`] if a sidecar's data file is absent.
pub fn scan_directory<P: AsRef<Path>>(
    dir: P,
    sidecar_extension: &str,
    data_suffix: &str,
) -> Result<Vec<AcquisitionPair>> {
    let dir = dir.as_ref();
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => log::debug!("skipping non UTF-8 file name {name:?}"),
        }
    }

    let listed: BTreeSet<&str> = names.iter().map(String::as_str).collect();
    let pairs = pair_acquisitions(&names, sidecar_extension, data_suffix);
    if pairs.is_empty() {
        return Err(Error::EmptyBatch(dir.to_path_buf()));
    }

    pairs
        .into_iter()
        .map(|pair| {
            let sidecar = dir.join(&pair.sidecar);
            let data = dir.join(&pair.data);
            if listed.contains(pair.data.as_str()) {
                Ok(AcquisitionPair { sidecar, data })
            } else {
                Err(Error::MissingCompanion {
                    sidecar,
                    expected: data,
                })
            }
        })
        .collect()
}

/// Properties shared by every member of a validated batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub element_type: ElementType,
    /// `(rows, cols)` of the reference acquisition.
    pub shape: (usize, usize),
    pub slices: usize,
}

/// Checks every data file's layout and element type against the first.
///
/// Reads headers only; no payload is decoded.
///
/// # Errors
/// Returns [`Error::EmptyBatch`] for an empty list,
/// [`Error::UnexpectedLayout`] for a member that is not a single 2D
/// element and [`Error::InconsistentBatch`] for an element type mismatch.
pub fn validate_batch(pairs: &[AcquisitionPair]) -> Result<BatchSummary> {
    let mut reference: Option<(ElementType, (usize, usize))> = None;

    for pair in pairs {
        let reader = SerFileReader::open(&pair.data)?;
        let header = reader.header();
        if !header.is_single_image() {
            return Err(Error::UnexpectedLayout {
                path: pair.data.clone(),
                data_type_id: header.data_type_id,
                valid_elements: header.valid_elements,
            });
        }
        let element = reader.element_header(0)?;

        match reference {
            None => reference = Some((element.element_type, element.shape())),
            Some((expected, _)) if expected != element.element_type => {
                return Err(Error::InconsistentBatch {
                    path: pair.data.clone(),
                    expected,
                    found: element.element_type,
                });
            }
            Some(_) => {}
        }
    }

    let (element_type, shape) = reference.ok_or_else(|| Error::EmptyBatch(PathBuf::new()))?;
    Ok(BatchSummary {
        element_type,
        shape,
        slices: pairs.len(),
    })
}
