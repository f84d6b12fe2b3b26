//! SER/EMI-specific error types.

use thiserror::Error;

/// Result type for SER/EMI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SER/EMI-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Header or element layout does not match what is expected.
    #[error("invalid SER format: {0}")]
    Format(String),

    /// Element-type code missing from the decode table.
    #[error("unsupported SER element type code: {0}")]
    UnsupportedType(u16),

    /// Fewer bytes available than the layout requires.
    #[error("truncated {what}: need {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// Sidecar (EMI) file without usable metadata.
    #[error("invalid EMI sidecar: {0}")]
    Sidecar(String),

    /// Malformed sidecar XML.
    #[error("invalid EMI XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] emdconv_core::Error),
}
