//! I/O error types.

use emdconv_core::ElementType;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No acquisition pairs in the input directory.
    #[error("no acquisitions found in {}", .0.display())]
    EmptyBatch(PathBuf),

    /// A batch member's element type differs from the first member's.
    #[error("{}: element type {found} differs from batch element type {expected}", path.display())]
    InconsistentBatch {
        path: PathBuf,
        expected: ElementType,
        found: ElementType,
    },

    /// A batch member is not a single-element 2D series.
    #[error(
        "{}: expected one valid 2D element, found data type {data_type_id:#06x} with {valid_elements} valid elements",
        path.display()
    )]
    UnexpectedLayout {
        path: PathBuf,
        data_type_id: u32,
        valid_elements: u32,
    },

    /// Sidecar without its data file.
    #[error("{}: missing data file {}", sidecar.display(), expected.display())]
    MissingCompanion { sidecar: PathBuf, expected: PathBuf },

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// SER/EMI decoder error.
    #[error("SER error: {0}")]
    SerError(#[from] emdconv_ser::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] emdconv_core::Error),

    /// Raster decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// TIFF decoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Malformed options file.
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}
