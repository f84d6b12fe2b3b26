#![allow(
    clippy::float_cmp,
    clippy::unreadable_literal,
    clippy::cast_possible_truncation
)]
use emdconv_core::{ComplexF64, ElementType, FieldValue, PixelData};
use emdconv_ser::encode::{EmiEncoder, SerEncoder};
use emdconv_ser::header::{SERIES_VERSION_64, TAG_TYPE_TIME_POSITION};
use emdconv_ser::{decode_acquisition, ElementCalibration, EmiMetadata, Error, SerHeader};
use ndarray::{array, Array2};

fn calibration(offset: f64, delta: f64, element: i32) -> ElementCalibration {
    ElementCalibration {
        offset,
        delta,
        element,
    }
}

#[test]
fn test_decode_acquisition_with_sidecar() {
    let pixels = PixelData::UInt16(Array2::from_shape_fn((4, 6), |(r, c)| (r * 6 + c) as u16));
    let encoder = SerEncoder {
        tag_type_id: TAG_TYPE_TIME_POSITION,
        time: 1_500_000_000,
        position: (2.0e-6, 3.0e-6),
        ..SerEncoder::default()
    };
    let ser = encoder
        .encode_image(
            &pixels,
            calibration(-3.0e-9, 1.0e-9, 0),
            calibration(0.0, 2.0e-9, 2),
        )
        .unwrap();
    let emi = EmiEncoder::new()
        .data("Stage Z", "4.2E-06")
        .data("Microscope", "Titan 80-300")
        .encode();

    let header = SerHeader::parse(&ser).unwrap();
    let sidecar = EmiMetadata::parse(&emi).unwrap();
    let (image, metadata) = decode_acquisition(&ser, &header, 0, Some(&sidecar)).unwrap();

    assert_eq!(image.pixels(), &pixels);
    assert_eq!(metadata.element_type, ElementType::UInt16);
    assert_eq!(metadata.shape, (4, 6));
    assert_eq!(metadata.x_axis.len(), 6);
    assert_eq!(metadata.y_axis.len(), 4);
    assert!((metadata.x_axis.coordinate(3) - 0.0).abs() < 1e-18);
    assert!((metadata.y_axis.coordinate(0) + 4.0e-9).abs() < 1e-18);

    assert_eq!(metadata.field_f64("Time").unwrap(), 1_500_000_000.0);
    assert_eq!(metadata.field_f64("PositionX").unwrap(), 2.0e-6);
    assert!((metadata.field_f64("Stage Z [um]").unwrap() - 4.2).abs() < 1e-9);
    assert_eq!(
        metadata.field("Microscope").unwrap(),
        &FieldValue::Text("Titan 80-300".to_string())
    );
}

#[test]
fn test_decode_wide_complex_series() {
    let pixels = PixelData::Complex128(array![
        [ComplexF64::new(1.0, 2.0), ComplexF64::new(-1.0, 0.5)],
        [ComplexF64::new(0.0, 0.0), ComplexF64::new(3.5, -3.5)],
    ]);
    let encoder = SerEncoder {
        series_version: SERIES_VERSION_64,
        ..SerEncoder::default()
    };
    let ser = encoder
        .encode_image(
            &pixels,
            ElementCalibration::default(),
            ElementCalibration::default(),
        )
        .unwrap();

    let header = SerHeader::parse(&ser).unwrap();
    let (image, metadata) = decode_acquisition(&ser, &header, 0, None).unwrap();
    assert_eq!(image.pixels(), &pixels);
    assert_eq!(metadata.element_type, ElementType::Complex128);
    assert!(metadata.field("Stage Z [um]").is_err());
}

#[test]
fn test_decode_rejects_spectrum_series() {
    let encoder = SerEncoder {
        data_type_id: emdconv_ser::header::DATA_TYPE_1D,
        ..SerEncoder::default()
    };
    let ser = encoder
        .encode_image(
            &PixelData::Float32(Array2::zeros((1, 8))),
            ElementCalibration::default(),
            ElementCalibration::default(),
        )
        .unwrap();
    let header = SerHeader::parse(&ser).unwrap();
    assert!(matches!(
        decode_acquisition(&ser, &header, 0, None),
        Err(Error::Format(_))
    ));
}

#[test]
fn test_decode_ignores_corrupt_tag() {
    let pixels = PixelData::UInt16(array![[1, 2], [3, 4]]);
    let mut ser = SerEncoder::default()
        .encode_image(
            &pixels,
            ElementCalibration::default(),
            ElementCalibration::default(),
        )
        .unwrap();
    let header = SerHeader::parse(&ser).unwrap();
    let tag = header.tag_offset(0).unwrap();
    ser[tag..tag + 2].fill(0);
    let sidecar = EmiMetadata::parse(&EmiEncoder::new().data("Stage Z", "1.5E-06").encode())
        .unwrap();

    assert!(emdconv_ser::read_tag(&ser, &header, 0).is_err());
    let (image, metadata) = decode_acquisition(&ser, &header, 0, Some(&sidecar)).unwrap();
    assert_eq!(image.pixels(), &pixels);
    assert!(metadata.field("Time").is_err());
    assert!((metadata.field_f64("Stage Z [um]").unwrap() - 1.5).abs() < 1e-9);
}

#[test]
fn test_decode_ignores_mismatched_tag_type() {
    let pixels = PixelData::UInt8(array![[7, 8], [9, 10]]);
    let ser = SerEncoder {
        tag_type_id: TAG_TYPE_TIME_POSITION,
        position: (1.0, 2.0),
        ..SerEncoder::default()
    }
    .encode_image(
        &pixels,
        ElementCalibration::default(),
        ElementCalibration::default(),
    )
    .unwrap();
    let mut header = SerHeader::parse(&ser).unwrap();
    header.tag_type_id = emdconv_ser::header::TAG_TYPE_TIME;

    let (_, metadata) = decode_acquisition(&ser, &header, 0, None).unwrap();
    assert!(metadata.fields.is_empty());
}
