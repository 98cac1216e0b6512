//! Generator Error Types
//!
//! Two tiers: [`ErrorKind::Package`] is a per-package fault that the run
//! recovers from by skipping the package. Every other variant aborts the run
//! and leaves the staging directory in place for inspection.

use derive_more::{Display, Error};
use repodata_package::models::DocumentKind;
use std::path::PathBuf;

/// A generator error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for generator operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// One package could not be read or rendered.
    #[display("cannot process package: {}", _0.display())]
    Package(#[error(not(source))] PathBuf),
    /// A package directory could not be listed.
    #[display("cannot scan directory: {}", _0.display())]
    Scan(#[error(not(source))] PathBuf),
    #[display("invalid glob pattern: {_0}")]
    Filter(#[error(not(source))] String),
    /// The staging directory exists already or could not be created.
    #[display("cannot use staging directory: {}", _0.display())]
    Staging(#[error(not(source))] PathBuf),
    /// A metadata document stream could not be written.
    #[display("cannot write {_0} document")]
    Document(#[error(not(source))] DocumentKind),
    #[display("cannot build repository manifest")]
    Manifest,
    #[display("cannot export {_0} database")]
    Database(#[error(not(source))] DocumentKind),
    #[display("cannot copy group file: {}", _0.display())]
    Group(#[error(not(source))] PathBuf),
    /// Swapping the staging directory into place failed.
    #[display("cannot publish metadata")]
    Publish,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Nothing is retried automatically; transient I/O is reported as is.
        false
    }

    /// Per-package faults are logged and skipped; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ErrorKind::Package(_))
    }
}
