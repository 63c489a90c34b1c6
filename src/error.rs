//! Error types for RTF de-encapsulation.
//!
//! All pipeline stages report through a single crate-wide error enum. Lexical
//! and structural failures carry the byte offset at which they were detected.

use thiserror::Error;

/// Main error type for de-encapsulation operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Structural parse or header violation in the RTF stream
    #[error("Malformed RTF: {0}")]
    MalformedRtf(String),

    /// Structurally valid RTF without encapsulation markers
    #[error("Not an encapsulated RTF stream: {0}")]
    NotEncapsulatedRtf(String),

    /// Encapsulation markers present but misordered or duplicated
    #[error("Malformed encapsulated RTF: {0}")]
    MalformedEncapsulatedRtf(String),

    /// A valid stream using features the core intentionally rejects
    #[error("Unsupported RTF format: {0}")]
    UnsupportedRtfFormat(String),
}

/// Result type for de-encapsulation operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::MalformedRtf(format!("integer parsing error: {}", err))
    }
}

impl Error {
    /// Build a `MalformedRtf` error annotated with the byte offset of the fault.
    pub(crate) fn malformed_at(offset: usize, msg: impl AsRef<str>) -> Self {
        Error::MalformedRtf(format!("{} at byte offset {}", msg.as_ref(), offset))
    }
}
