//! Memory-mapped acquisition readers.
//!

use crate::Result;
use emdconv_core::{AcquisitionMetadata, ElementType, RawImage};
use emdconv_ser::{ElementTag, EmiMetadata, ImageElementHeader, SerHeader};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without loading the entire file
/// into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A SER series reader with an optional EMI sidecar.
pub struct SerFileReader {
    reader: MappedFileReader,
    header: SerHeader,
    sidecar: Option<EmiMetadata>,
}

impl SerFileReader {
    /// Opens a SER file and parses its series header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or the header is invalid.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        let header = SerHeader::parse(reader.as_bytes())?;
        log::debug!(
            "{}: data type {:#06x}, {} valid elements",
            reader.path().display(),
            header.data_type_id,
            header.valid_elements
        );
        Ok(Self {
            reader,
            header,
            sidecar: None,
        })
    }

    /// Opens a SER file together with its EMI sidecar.
    ///
    /// # Errors
    /// Returns an error if either file cannot be read or parsed.
    pub fn open_pair<P: AsRef<Path>, Q: AsRef<Path>>(ser: P, emi: Q) -> Result<Self> {
        let mut reader = Self::open(ser)?;
        let sidecar = MappedFileReader::open(emi)?;
        reader.sidecar = Some(EmiMetadata::parse(sidecar.as_bytes())?);
        Ok(reader)
    }

    #[must_use]
    pub fn header(&self) -> &SerHeader {
        &self.header
    }

    #[must_use]
    pub fn sidecar(&self) -> Option<&EmiMetadata> {
        self.sidecar.as_ref()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Element type of element `index` without decoding the payload.
    ///
    /// # Errors
    /// Returns an error for non single-image layouts or unknown type codes.
    pub fn element_type(&self, index: usize) -> Result<ElementType> {
        Ok(emdconv_ser::read_element_type(
            self.reader.as_bytes(),
            &self.header,
            index,
        )?)
    }

    /// Shape, type and calibration of element `index`.
    ///
    /// # Errors
    /// Returns an error for non single-image layouts or unknown type codes.
    pub fn element_header(&self, index: usize) -> Result<ImageElementHeader> {
        Ok(emdconv_ser::read_element_header(
            self.reader.as_bytes(),
            &self.header,
            index,
        )?)
    }

    /// Tag of element `index`, if present.
    ///
    /// # Errors
    /// Returns an error if the tag cannot be decoded.
    pub fn tag(&self, index: usize) -> Result<Option<ElementTag>> {
        Ok(emdconv_ser::read_tag(
            self.reader.as_bytes(),
            &self.header,
            index,
        )?)
    }

    /// Decodes element `index` with its tag and sidecar fields.
    ///
    /// # Errors
    /// Returns an error if the element cannot be decoded.
    pub fn read_image(&self, index: usize) -> Result<(RawImage, AcquisitionMetadata)> {
        Ok(emdconv_ser::decode_acquisition(
            self.reader.as_bytes(),
            &self.header,
            index,
            self.sidecar.as_ref(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use emdconv_core::PixelData;
    use emdconv_ser::encode::{EmiEncoder, SerEncoder};
    use emdconv_ser::ElementCalibration;
    use ndarray::array;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_mapped_file_reader() {
        let file = write_temp(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 8);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_bytes()[3], 4);
    }

    #[test]
    fn test_ser_reader_with_sidecar() {
        let pixels = PixelData::Int32(array![[1, -2], [3, -4], [5, -6]]);
        let ser = SerEncoder::default()
            .encode_image(
                &pixels,
                ElementCalibration::default(),
                ElementCalibration::default(),
            )
            .unwrap();
        let emi = EmiEncoder::new().data("Stage Z", "2.0E-06").encode();
        let ser_file = write_temp(&ser);
        let emi_file = write_temp(&emi);

        let reader = SerFileReader::open_pair(ser_file.path(), emi_file.path()).unwrap();
        assert!(reader.header().is_single_image());
        assert_eq!(reader.element_type(0).unwrap(), ElementType::Int32);

        let (image, metadata) = reader.read_image(0).unwrap();
        assert_eq!(image.pixels(), &pixels);
        assert_eq!(metadata.shape, (3, 2));
        assert!((metadata.field_f64("Stage Z [um]").unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ser_reader_rejects_garbage() {
        let file = write_temp(b"not a series file at all, just text");
        assert!(matches!(
            SerFileReader::open(file.path()),
            Err(Error::SerError(_))
        ));
    }
}
