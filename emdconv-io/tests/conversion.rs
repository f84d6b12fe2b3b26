#![cfg(feature = "hdf5")]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
use approx::assert_relative_eq;
use emdconv_core::{BinningFactor, ElementType, FieldValue, PixelData};
use emdconv_io::{
    convert_single_image, convert_stack, convert_stack_with_progress, EmdFile, Error,
    StackOptions, StackProgress, StackStage,
};
use emdconv_ser::encode::{EmiEncoder, SerEncoder};
use emdconv_ser::ElementCalibration;
use ndarray::Array2;
use std::fs::{self, File};
use std::path::Path;
use tempfile::tempdir;
use tiff::encoder::{colortype, TiffEncoder};

const ROWS: usize = 4;
const COLS: usize = 6;

fn slice_pixels(slice: usize) -> PixelData {
    PixelData::UInt16(Array2::from_shape_fn((ROWS, COLS), |(r, c)| {
        (slice * 100 + r * COLS + c) as u16
    }))
}

fn write_acquisition(dir: &Path, stem: &str, pixels: &PixelData, stage_z_m: &str) {
    let x = ElementCalibration {
        offset: -3.0e-9,
        delta: 1.0e-9,
        element: 0,
    };
    let y = ElementCalibration {
        offset: 0.0,
        delta: 2.0e-9,
        element: 0,
    };
    let ser = SerEncoder::default().encode_image(pixels, x, y).unwrap();
    fs::write(dir.join(format!("{stem}_1.ser")), ser).unwrap();
    let emi = EmiEncoder::new()
        .leaf("Mode", "STEM")
        .data("Stage Z", stage_z_m)
        .encode();
    fs::write(dir.join(format!("{stem}.emi")), emi).unwrap();
}

fn write_batch(dir: &Path) {
    write_acquisition(dir, "zstack_000", &slice_pixels(0), "1.0E-06");
    write_acquisition(dir, "zstack_001", &slice_pixels(1), "2.5E-06");
    write_acquisition(dir, "zstack_002", &slice_pixels(2), "-3.0E-06");
}

#[test]
fn test_stack_round_trip() {
    let root = tempdir().unwrap();
    let batch = root.path().join("series");
    fs::create_dir(&batch).unwrap();
    write_batch(&batch);
    let output = root.path().join("stack.emd");

    let report = convert_stack(&batch, &output, &StackOptions::default()).unwrap();
    assert_eq!(report.group, "series");
    assert_eq!(report.shape, vec![3, ROWS, COLS]);
    assert_eq!(report.element_type, ElementType::UInt16);
    assert_eq!(report.slices, 3);

    let emd = EmdFile::open(&output).unwrap();
    assert_eq!(emd.group_names().unwrap(), vec!["series".to_string()]);
    let group = emd.data_group("series").unwrap();
    assert_eq!(group.group_type().unwrap(), 1);
    assert_eq!(group.data_element_type().unwrap(), ElementType::UInt16);

    let data = group.read_data::<u16>().unwrap();
    assert_eq!(data.shape(), &[3, ROWS, COLS]);
    for slice in 0..3 {
        assert_eq!(data[[slice, 0, 0]], (slice * 100) as u16);
        assert_eq!(data[[slice, 3, 5]], (slice * 100 + 23) as u16);
    }

    let dim1 = group.read_dim(1).unwrap();
    assert_eq!(dim1.name, "Stage Z");
    assert_eq!(dim1.units, "[um]");
    assert_eq!(dim1.len(), 3);
    for (value, expected) in dim1.values.iter().zip([1.0, 2.5, -3.0]) {
        assert_relative_eq!(*value, expected, epsilon = 1e-9);
    }

    let dim2 = group.read_dim(2).unwrap();
    assert_eq!((dim2.name.as_str(), dim2.units.as_str()), ("y", "[m]"));
    assert_eq!(dim2.len(), ROWS);
    assert_relative_eq!(dim2.values[3], 6.0e-9);

    let dim3 = group.read_dim(3).unwrap();
    assert_eq!(dim3.name, "x");
    assert_eq!(dim3.len(), COLS);
    assert_relative_eq!(dim3.values[0], -3.0e-9);

    let comments = emd.comments().unwrap();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].1.contains("z-stack"));
}

#[test]
fn test_stack_binned() {
    let root = tempdir().unwrap();
    let batch = root.path().join("series");
    fs::create_dir(&batch).unwrap();
    write_batch(&batch);
    let output = root.path().join("binned.emd");

    let options = StackOptions {
        binning: BinningFactor::new(2).unwrap(),
        ..StackOptions::default()
    };
    let report = convert_stack(&batch, &output, &options).unwrap();
    assert_eq!(report.shape, vec![3, ROWS / 2, COLS / 2]);
    assert_eq!(report.element_type, ElementType::Float64);

    let emd = EmdFile::open(&output).unwrap();
    let group = emd.data_group("series").unwrap();
    let data = group.read_data::<f64>().unwrap();
    assert_eq!(data.shape(), &[3, 2, 3]);
    // Top-left block of slice 1: {100, 101, 106, 107}.
    assert_relative_eq!(data[[1, 0, 0]], 103.5);
    // Bottom-right block of slice 0: {16, 17, 22, 23}.
    assert_relative_eq!(data[[0, 1, 2]], 19.5);

    let dim1 = group.read_dim(1).unwrap();
    assert_eq!(dim1.len(), 3);
    assert_relative_eq!(dim1.values[1], 2.5, epsilon = 1e-9);

    let dim2 = group.read_dim(2).unwrap();
    assert_eq!(dim2.len(), 2);
    assert_relative_eq!(dim2.values[0], 1.0e-9);
    let dim3 = group.read_dim(3).unwrap();
    assert_eq!(dim3.len(), 3);
    assert_relative_eq!(dim3.values[0], -2.5e-9);
}

#[test]
fn test_empty_batch_leaves_output_alone() {
    let root = tempdir().unwrap();
    let batch = root.path().join("empty");
    fs::create_dir(&batch).unwrap();
    let output = root.path().join("never.emd");

    let err = convert_stack(&batch, &output, &StackOptions::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyBatch(_)));
    assert!(!output.exists());
}

#[test]
fn test_inconsistent_batch_leaves_output_alone() {
    let root = tempdir().unwrap();
    let batch = root.path().join("mixed");
    fs::create_dir(&batch).unwrap();
    write_acquisition(&batch, "a", &slice_pixels(0), "0.0");
    write_acquisition(
        &batch,
        "b",
        &PixelData::Float32(Array2::zeros((ROWS, COLS))),
        "1.0E-06",
    );
    let output = root.path().join("previous.emd");
    fs::write(&output, b"previous result").unwrap();

    let err = convert_stack(&batch, &output, &StackOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::InconsistentBatch {
            expected: ElementType::UInt16,
            found: ElementType::Float32,
            ..
        }
    ));
    assert_eq!(fs::read(&output).unwrap(), b"previous result");
}

#[test]
fn test_oversized_binning_factor_leaves_output_alone() {
    let root = tempdir().unwrap();
    let batch = root.path().join("series");
    fs::create_dir(&batch).unwrap();
    write_batch(&batch);
    let output = root.path().join("previous.emd");
    fs::write(&output, b"previous result").unwrap();

    let options = StackOptions {
        binning: BinningFactor::new(8).unwrap(),
        ..StackOptions::default()
    };
    let err = convert_stack(&batch, &output, &options).unwrap_err();
    assert!(matches!(
        err,
        Error::CoreError(emdconv_core::Error::BinningExceedsExtent {
            factor: 8,
            rows: ROWS,
            cols: COLS,
        })
    ));
    assert!(err.to_string().contains("exceeds image extent 4x6"));
    assert_eq!(fs::read(&output).unwrap(), b"previous result");
}

#[test]
fn test_missing_stage_field() {
    let root = tempdir().unwrap();
    let batch = root.path().join("series");
    fs::create_dir(&batch).unwrap();
    write_batch(&batch);

    let options = StackOptions {
        stage_field: "Stage Q [um]".to_string(),
        ..StackOptions::default()
    };
    let err = convert_stack(&batch, root.path().join("out.emd"), &options).unwrap_err();
    assert!(matches!(
        err,
        Error::CoreError(emdconv_core::Error::MissingField(_))
    ));
}

#[test]
fn test_stack_progress_sequence() {
    let root = tempdir().unwrap();
    let batch = root.path().join("series");
    fs::create_dir(&batch).unwrap();
    write_batch(&batch);

    let mut events = Vec::new();
    convert_stack_with_progress(
        &batch,
        root.path().join("out.emd"),
        &StackOptions::default(),
        |event| events.push(event.clone()),
    )
    .unwrap();

    let stages: Vec<StackStage> = events
        .iter()
        .filter_map(|event| match event {
            StackProgress::Stage(stage) => Some(*stage),
            StackProgress::Slice { .. } => None,
        })
        .collect();
    assert_eq!(
        stages,
        [
            StackStage::Enumerating,
            StackStage::LoadingReference,
            StackStage::Allocating,
            StackStage::Slicing,
            StackStage::WritingDimensions,
            StackStage::Done,
        ]
    );

    let slices: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            StackProgress::Slice { index, total, .. } => {
                assert_eq!(*total, 3);
                Some(*index)
            }
            StackProgress::Stage(_) => None,
        })
        .collect();
    assert_eq!(slices, [0, 1, 2]);
}

fn write_tiff(path: &Path) {
    let values: Vec<u16> = (0..12).collect();
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    encoder
        .write_image::<colortype::Gray16>(4, 3, &values)
        .unwrap();
}

#[test]
fn test_single_image() {
    let root = tempdir().unwrap();
    let input = root.path().join("frame.tif");
    write_tiff(&input);
    let output = root.path().join("frame.emd");

    let report = convert_single_image(&input, &output).unwrap();
    assert_eq!(report.group, "frame.tif");
    assert_eq!(report.shape, vec![3, 4]);
    assert_eq!(report.element_type, ElementType::UInt16);

    let emd = EmdFile::open(&output).unwrap();
    let group = emd.data_group("frame.tif").unwrap();
    let data = group.read_data::<u16>().unwrap();
    assert_eq!(data[[2, 3]], 11);

    let y = group.read_dim(1).unwrap();
    let x = group.read_dim(2).unwrap();
    assert_eq!((y.name.as_str(), y.units.as_str()), ("y", "pixel"));
    assert_eq!((x.name.as_str(), x.units.as_str()), ("x", "pixel"));
    assert_eq!(y.len(), 3);
    assert_eq!(x.len(), 4);
    assert_eq!(x.values[3], 3.0);
}

#[test]
fn test_single_image_overwrite_is_idempotent() {
    let root = tempdir().unwrap();
    let input = root.path().join("frame.tif");
    write_tiff(&input);
    let output = root.path().join("frame.emd");

    let first = convert_single_image(&input, &output).unwrap();
    let second = convert_single_image(&input, &output).unwrap();
    assert_eq!(first, second);

    let emd = EmdFile::open(&output).unwrap();
    assert_eq!(emd.group_names().unwrap(), vec!["frame.tif".to_string()]);
    assert_eq!(emd.comments().unwrap().len(), 1);
    let group = emd.data_group("frame.tif").unwrap();
    assert_eq!(group.data_shape().unwrap(), vec![3, 4]);
    assert_eq!(group.read_dim(1).unwrap().len(), 3);
    assert_eq!(group.read_dim(2).unwrap().len(), 4);
}

#[test]
fn test_sidecar_fields_reach_metadata() {
    let root = tempdir().unwrap();
    write_acquisition(root.path(), "one", &slice_pixels(0), "4.0E-06");
    let reader = emdconv_io::SerFileReader::open_pair(
        root.path().join("one_1.ser"),
        root.path().join("one.emi"),
    )
    .unwrap();
    let (_, metadata) = reader.read_image(0).unwrap();
    assert_eq!(
        metadata.field("Mode").unwrap(),
        &FieldValue::Text("STEM".to_string())
    );
}
