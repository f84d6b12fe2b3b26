//! emdconv-io: File I/O and conversion pipelines for emdconv.
//!
//! This crate reads acquisitions through memory-mapped files (memmap2),
//! discovers and validates SER/EMI batches, writes EMD containers (HDF5) and
//! composes them into the single-image and z-stack conversions.
//!

#[cfg(feature = "hdf5")]
pub mod convert;
#[cfg(feature = "hdf5")]
pub mod emd;
mod error;
mod options;
pub mod raster;
mod reader;
pub mod scanner;

#[cfg(feature = "hdf5")]
pub use convert::{
    convert_single_image, convert_stack, convert_stack_with_progress, ConversionReport,
    StackProgress, StackStage,
};
#[cfg(feature = "hdf5")]
pub use emd::{DataGroup, EmdFile};
pub use error::{Error, Result};
pub use options::StackOptions;
pub use raster::read_raster;
pub use reader::{MappedFileReader, SerFileReader};
pub use scanner::{pair_acquisitions, scan_directory, validate_batch, AcquisitionPair, BatchSummary};
