//! Error types for pdfsift.

use std::io;
use thiserror::Error;

/// Result type alias for pdfsift operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while extracting content from a PDF.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading the source or writing outputs.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Error extracting text content.
    #[error("Text extraction error: {0}")]
    TextExtract(String),

    /// A stream filter failed on corrupt data.
    #[error("Stream decoding error: {0}")]
    StreamDecode(String),

    /// A stream uses a filter we do not implement.
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Error while detecting tables.
    #[error("Table detection error: {0}")]
    TableDetect(String),

    /// Error decoding an embedded image.
    #[error("Image decoding error: {0}")]
    ImageDecode(String),

    /// The image uses an encoding or colour space we cannot decode.
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    /// The pipeline configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid page range specification.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    /// Error serializing the result record.
    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => Error::Io(e),
            _ => Error::ImageDecode(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize(err.to_string())
    }
}
