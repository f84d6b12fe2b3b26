//! Conversion pipelines: single raster image and SER z-stack to EMD.
//!
//! Both pipelines build the output container from scratch. Validation that
//! can fail without decoding payloads (empty batch, unexpected layout,
//! inconsistent element types) happens before the output path is touched.
//! A failure after that point may leave a partially written container.

use crate::emd::EmdFile;
use crate::raster::read_raster;
use crate::reader::SerFileReader;
use crate::scanner::{scan_directory, validate_batch};
use crate::{Error, Result, StackOptions};
use emdconv_core::{
    bin_image, binned_shape, CalibrationAxis, DimensionVector, ElementType, StackData,
};
use ndarray::Array1;
use std::fmt;
use std::path::{Path, PathBuf};

const SINGLE_IMAGE_COMMENT: &str = "Converted single image file to EMD using emdconv.";
const STACK_COMMENT: &str = "Combined SER files into a z-stack EMD using emdconv.";

/// Stages of the z-stack pipeline, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackStage {
    Enumerating,
    LoadingReference,
    Allocating,
    Slicing,
    WritingDimensions,
    Done,
}

/// Progress notification from [`convert_stack_with_progress`].
#[derive(Debug, Clone, PartialEq)]
pub enum StackProgress {
    /// The pipeline entered a new stage.
    Stage(StackStage),
    /// Slice `index` of `total` is being imported from `path`.
    Slice {
        index: usize,
        total: usize,
        path: PathBuf,
    },
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub output: PathBuf,
    /// Name of the group created under `data`.
    pub group: String,
    /// Shape of the written `data` dataset.
    pub shape: Vec<usize>,
    pub element_type: ElementType,
    /// Number of imported acquisitions.
    pub slices: usize,
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wrote data/{} {:?} {} to {}",
            self.group,
            self.shape,
            self.element_type,
            self.output.display()
        )
    }
}

/// Group name for an input path: its file name, resolving `.` and `..`.
fn group_name(path: &Path) -> Result<String> {
    if let Some(name) = path.file_name() {
        return Ok(name.to_string_lossy().into_owned());
    }
    let canonical = path.canonicalize()?;
    canonical
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::InvalidFormat(format!(
                "cannot derive a group name from {}",
                path.display()
            ))
        })
}

/// Converts one greyscale raster to an EMD container.
///
/// The image keeps its native element type; both dimension vectors are
/// pixel indices (`y`, `x`, units `pixel`).
///
/// # Errors
/// Returns an error if the raster cannot be read or the container written.
pub fn convert_single_image<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> Result<ConversionReport> {
    let (input, output) = (input.as_ref(), output.as_ref());

    log::debug!("single image: reading {}", input.display());
    let image = read_raster(input)?;
    let name = group_name(input)?;
    let (rows, cols) = image.shape();

    log::debug!("single image: writing {}", output.display());
    let emd = EmdFile::create_fresh(output)?;
    let group = emd.create_data_group(&name)?;
    group.write_data(image.pixels())?;
    group.write_dim(
        1,
        &DimensionVector::from_axis(&CalibrationAxis::pixels(rows)?, "y", "pixel"),
    )?;
    group.write_dim(
        2,
        &DimensionVector::from_axis(&CalibrationAxis::pixels(cols)?, "x", "pixel"),
    )?;
    emd.put_comment(SINGLE_IMAGE_COMMENT)?;
    emd.close()?;

    log::debug!("single image: done");
    Ok(ConversionReport {
        output: output.to_path_buf(),
        group: name,
        shape: vec![rows, cols],
        element_type: image.element_type(),
        slices: 1,
    })
}

/// Combines a directory of SER/EMI acquisitions into a z-stack.
///
/// # Errors
/// See [`convert_stack_with_progress`].
pub fn convert_stack<P: AsRef<Path>, Q: AsRef<Path>>(
    input_dir: P,
    output: Q,
    options: &StackOptions,
) -> Result<ConversionReport> {
    convert_stack_with_progress(input_dir, output, options, |_| {})
}

fn enter<F: FnMut(&StackProgress)>(progress: &mut F, stage: StackStage) {
    log::debug!("stack conversion: {stage:?}");
    progress(&StackProgress::Stage(stage));
}

/// Combines a directory of SER/EMI acquisitions into a z-stack, reporting
/// progress.
///
/// The output group is named after the directory and holds `data` of shape
/// `(slices, rows / f, cols / f)`, `dim1` with each slice's stage
/// coordinate, and `dim2`/`dim3` with the reference acquisition's y and x
/// calibration, binned like the data.
///
/// # Errors
/// Returns [`Error::EmptyBatch`], [`Error::MissingCompanion`],
/// [`Error::UnexpectedLayout`] or [`Error::InconsistentBatch`] before the
/// output is touched; decoder, missing stage field and HDF5 errors abort the
/// slicing loop.
pub fn convert_stack_with_progress<P, Q, F>(
    input_dir: P,
    output: Q,
    options: &StackOptions,
    mut progress: F,
) -> Result<ConversionReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    F: FnMut(&StackProgress),
{
    let (input_dir, output) = (input_dir.as_ref(), output.as_ref());
    let factor = options.binning;

    enter(&mut progress, StackStage::Enumerating);
    let pairs = scan_directory(
        input_dir,
        &options.sidecar_extension,
        &options.data_suffix,
    )?;
    let summary = validate_batch(&pairs)?;
    let name = group_name(input_dir)?;

    enter(&mut progress, StackStage::LoadingReference);
    let reference = SerFileReader::open(&pairs[0].data)?.element_header(0)?;
    let (rows, cols) = reference.shape();
    let (out_rows, out_cols) = binned_shape((rows, cols), factor);
    if out_rows == 0 || out_cols == 0 {
        return Err(emdconv_core::Error::BinningExceedsExtent {
            factor: factor.get(),
            rows,
            cols,
        }
        .into());
    }
    let element_type = if factor.is_identity() {
        summary.element_type
    } else {
        summary.element_type.binned()
    };
    let y_axis = reference.calibration_y.to_axis(rows)?;
    let x_axis = reference.calibration_x.to_axis(cols)?;

    enter(&mut progress, StackStage::Allocating);
    let total = pairs.len();
    let emd = EmdFile::create_fresh(output)?;
    let group = emd.create_data_group(&name)?;
    let dataset = group.allocate_data(element_type, &[total, out_rows, out_cols])?;
    let mut stack = StackData::for_slices(element_type, total, out_rows, out_cols);
    let mut positions = Vec::with_capacity(total);

    enter(&mut progress, StackStage::Slicing);
    for (index, pair) in pairs.iter().enumerate() {
        log::info!("importing file {}", pair.data.display());
        progress(&StackProgress::Slice {
            index,
            total,
            path: pair.data.clone(),
        });

        let reader = SerFileReader::open_pair(&pair.data, &pair.sidecar)?;
        let (image, metadata) = reader.read_image(0)?;
        stack.assign_slice(index, &bin_image(image.pixels(), factor))?;
        positions.push(metadata.field_f64(&options.stage_field)?);
    }
    dataset.write_all(&stack)?;

    enter(&mut progress, StackStage::WritingDimensions);
    group.write_dim(
        1,
        &DimensionVector::new(
            Array1::from(positions),
            options.slice_axis_name.as_str(),
            options.slice_axis_units.as_str(),
        ),
    )?;
    group.write_dim(
        2,
        &DimensionVector::from_axis(&y_axis, "y", options.spatial_units.as_str()).binned(factor),
    )?;
    group.write_dim(
        3,
        &DimensionVector::from_axis(&x_axis, "x", options.spatial_units.as_str()).binned(factor),
    )?;
    emd.put_comment(STACK_COMMENT)?;
    emd.close()?;

    enter(&mut progress, StackStage::Done);
    Ok(ConversionReport {
        output: output.to_path_buf(),
        group: name,
        shape: vec![total, out_rows, out_cols],
        element_type,
        slices: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_name_from_file_name() {
        assert_eq!(
            group_name(Path::new("/data/run/frame_001.tif")).unwrap(),
            "frame_001.tif"
        );
        assert_eq!(group_name(Path::new("/data/zstack/")).unwrap(), "zstack");
    }

    #[test]
    fn test_group_name_resolves_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let expected = dir
            .path()
            .canonicalize()
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let parent = dir.path().join("sub").join("..");
        assert_eq!(group_name(&parent).unwrap(), expected);
    }

    #[test]
    fn test_report_display() {
        let report = ConversionReport {
            output: PathBuf::from("out.emd"),
            group: "stack".to_string(),
            shape: vec![3, 2, 2],
            element_type: ElementType::Float64,
            slices: 3,
        };
        assert_eq!(report.to_string(), "wrote data/stack [3, 2, 2] float64 to out.emd");
    }
}
