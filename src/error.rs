use std::fmt;
use std::io;
use std::string::FromUtf8Error;

use crate::atom::Fourcc;

/// A specialized [`Result`](std::result::Result) type for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of error that occurred.
#[derive(Debug)]
pub enum ErrorKind {
    /// The input ended before a declared size was satisfied.
    Truncated,
    /// An atom declared a size that is internally inconsistent (too small for
    /// its own header, or a 64-bit size sentinel without the extended field).
    InvalidSize,
    /// A box required at a given path was not present.
    MissingBox(Fourcc),
    /// A track index or identifier did not resolve to any `trak` atom.
    TrackNotFound(usize),
    /// A container atom had no parseable children where at least one was
    /// required, or a child appeared at a position the format forbids.
    InvalidContainer,
    /// A computed byte offset did not fit the target integer width.
    OffsetOverflow,
    /// A payload's bytes did not match the shape its type code promised.
    MalformedPayload,
    /// Wrapped I/O error.
    Io(io::Error),
    /// A string payload was not valid UTF-8.
    Utf8StringDecoding,
    /// A JSON payload failed to parse or did not match the expected shape.
    Json(serde_json::Error),
}

/// The error type for this crate's operations.
pub struct Error {
    pub kind: ErrorKind,
    pub description: String,
}

impl Error {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self { kind, description: description.into() }
    }

    pub fn truncated(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Truncated, description)
    }

    pub fn invalid_size(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSize, description)
    }

    pub fn missing_box(fourcc: Fourcc) -> Self {
        Self::new(ErrorKind::MissingBox(fourcc), format!("missing required box: {}", fourcc))
    }

    pub fn track_not_found(index: usize) -> Self {
        Self::new(ErrorKind::TrackNotFound(index), format!("no track at index {}", index))
    }

    pub fn invalid_container(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidContainer, description)
    }

    pub fn offset_overflow(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::OffsetOverflow, description)
    }

    pub fn malformed_payload(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedPayload, description)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.description)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::MissingBox(fourcc) => write!(f, "missing box '{}': {}", fourcc, self.description),
            ErrorKind::TrackNotFound(i) => write!(f, "track not found (index {}): {}", i, self.description),
            _ => write!(f, "{}", self.description),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Io(err), "io error".to_owned())
    }
}

impl From<FromUtf8Error> for Error {
    fn from(err: FromUtf8Error) -> Self {
        Self::new(ErrorKind::Utf8StringDecoding, err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Json(err), "invalid json payload".to_owned())
    }
}
