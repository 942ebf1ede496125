//! Error types for podcheck.
//!
//! Only input problems are errors. Structural anomalies inside a loaded
//! document are recorded in the report, and policy violations are the
//! report's purpose, so neither ever surfaces here.

use std::io;
use thiserror::Error;

/// Result type alias for podcheck operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a preflight run before analysis starts.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading the input file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF header carries a version string we cannot read.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// The PDF object structure could not be loaded.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The document is encrypted and does not open with an empty password.
    #[error("Document is encrypted")]
    Encrypted,

    /// The document loaded but has no pages to check.
    #[error("Document has no pages")]
    NoPages,

    /// Malformed trim specification (expected `WxH` in inches).
    #[error("Invalid trim: {0} (expected WxH like 5.5x8.5)")]
    InvalidTrim(String),

    /// Error serializing a report.
    #[error("Rendering error: {0}")]
    Render(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NoPages;
        assert_eq!(err.to_string(), "Document has no pages");

        let err = Error::InvalidTrim("5.5 by 8.5".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid trim: 5.5 by 8.5 (expected WxH like 5.5x8.5)"
        );
    }

    #[test]
    fn test_decryption_error_conversion() {
        let err: Error = lopdf::Error::Decryption(
            lopdf::encryption::DecryptionError::IncorrectPassword,
        )
        .into();
        assert!(matches!(err, Error::Encrypted));
        assert_eq!(err.to_string(), "Document is encrypted");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
