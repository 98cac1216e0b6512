//! Package Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A package reading error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for package operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a package archive (or a document describing packages) could not be
/// turned into metadata.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The archive could not be opened or read.
    #[display("cannot read package: {}", _0.display())]
    File(#[error(not(source))] PathBuf),
    /// The file does not start with an RPM lead.
    #[display("not an RPM package")]
    NotAPackage,
    /// A header structure is truncated or inconsistent.
    #[display("malformed header: {_0}")]
    MalformedHeader(#[error(not(source))] String),
    /// A tag every package must carry is absent.
    #[display("missing required tag: {_0}")]
    MissingTag(#[error(not(source))] &'static str),
    /// The archive checksum could not be computed.
    #[display("cannot checksum package")]
    Checksum,
    /// A previously written metadata document could not be parsed.
    #[display("malformed metadata document: {_0}")]
    MalformedDocument(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::File(_) | ErrorKind::Checksum)
    }
}
