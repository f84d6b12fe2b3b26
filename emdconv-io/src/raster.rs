//! Generic raster loading for single-image conversion.
//!
//! TIFF files are decoded directly with the `tiff` crate so that every grey
//! sample type survives unchanged; everything else goes through `image` and
//! must be 8 or 16-bit greyscale.

use crate::{Error, Result};
use emdconv_core::{PixelData, RawImage};
use image::{DynamicImage, ImageFormat};
use ndarray::Array2;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;

/// Loads a greyscale raster as a `(rows, cols)` image.
///
/// # Errors
/// Returns [`Error::InvalidFormat`] for colour rasters and decoder errors
/// for unreadable files.
pub fn read_raster<P: AsRef<Path>>(path: P) -> Result<RawImage> {
    let path = path.as_ref();
    let image = if matches!(ImageFormat::from_path(path), Ok(ImageFormat::Tiff)) {
        read_tiff(path)?
    } else {
        read_generic(path)?
    };
    log::debug!(
        "{}: {:?} {}",
        path.display(),
        image.shape(),
        image.element_type()
    );
    Ok(image)
}

fn to_array<T>(values: Vec<T>, rows: usize, cols: usize) -> Result<Array2<T>> {
    Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| Error::InvalidFormat(format!("raster does not fill {rows}x{cols}: {e}")))
}

fn read_tiff(path: &Path) -> Result<RawImage> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let (width, height) = decoder.dimensions()?;
    let color = decoder.colortype()?;
    if !matches!(color, ColorType::Gray(_)) {
        return Err(Error::InvalidFormat(format!(
            "{}: expected a greyscale TIFF, found {color:?}",
            path.display()
        )));
    }

    let (rows, cols) = (height as usize, width as usize);
    let pixels = match decoder.read_image()? {
        DecodingResult::U8(values) => PixelData::UInt8(to_array(values, rows, cols)?),
        DecodingResult::U16(values) => PixelData::UInt16(to_array(values, rows, cols)?),
        DecodingResult::U32(values) => PixelData::UInt32(to_array(values, rows, cols)?),
        DecodingResult::U64(values) => PixelData::UInt64(to_array(values, rows, cols)?),
        DecodingResult::I8(values) => PixelData::Int8(to_array(values, rows, cols)?),
        DecodingResult::I16(values) => PixelData::Int16(to_array(values, rows, cols)?),
        DecodingResult::I32(values) => PixelData::Int32(to_array(values, rows, cols)?),
        DecodingResult::I64(values) => PixelData::Int64(to_array(values, rows, cols)?),
        DecodingResult::F32(values) => PixelData::Float32(to_array(values, rows, cols)?),
        DecodingResult::F64(values) => PixelData::Float64(to_array(values, rows, cols)?),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::InvalidFormat(format!(
                "{}: unsupported TIFF sample format",
                path.display()
            )))
        }
    };
    Ok(RawImage::new(pixels))
}

fn read_generic(path: &Path) -> Result<RawImage> {
    let decoded = image::open(path)?;
    let (rows, cols) = (decoded.height() as usize, decoded.width() as usize);
    let pixels = match decoded {
        DynamicImage::ImageLuma8(buffer) => {
            PixelData::UInt8(to_array(buffer.into_raw(), rows, cols)?)
        }
        DynamicImage::ImageLuma16(buffer) => {
            PixelData::UInt16(to_array(buffer.into_raw(), rows, cols)?)
        }
        other => {
            return Err(Error::InvalidFormat(format!(
                "{}: expected an 8 or 16-bit greyscale image, found {:?}",
                path.display(),
                other.color()
            )))
        }
    };
    Ok(RawImage::new(pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use emdconv_core::ElementType;
    use ndarray::array;
    use tempfile::tempdir;
    use tiff::encoder::{colortype, TiffEncoder};

    #[test]
    fn test_read_float_tiff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.tif");
        let values: Vec<f32> = (0..6u8).map(f32::from).collect();
        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(3, 2, &values)
            .unwrap();

        let image = read_raster(&path).unwrap();
        assert_eq!(image.shape(), (2, 3));
        assert_eq!(
            image.pixels(),
            &PixelData::Float32(array![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]])
        );
    }

    #[test]
    fn test_read_png_luma16() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let buffer = image::ImageBuffer::<image::Luma<u16>, _>::from_raw(2, 2, vec![1u16, 2, 3, 4])
            .unwrap();
        buffer.save(&path).unwrap();

        let image = read_raster(&path).unwrap();
        assert_eq!(image.element_type(), ElementType::UInt16);
        assert_eq!(image.pixels(), &PixelData::UInt16(array![[1, 2], [3, 4]]));
    }

    #[test]
    fn test_rejects_colour() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("colour.tif");
        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::RGB8>(1, 1, &[255, 0, 0])
            .unwrap();

        assert!(matches!(read_raster(&path), Err(Error::InvalidFormat(_))));
    }
}
