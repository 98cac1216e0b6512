//! Checksum Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A checksum error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for checksum operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The algorithm name is not one that metadata documents use.
    #[display("unsupported checksum type: {_0}")]
    UnsupportedType(#[error(not(source))] String),
    /// The file to digest could not be opened or read.
    #[display("cannot checksum file: {}", _0.display())]
    File(#[error(not(source))] PathBuf),
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io | ErrorKind::File(_))
    }
}
