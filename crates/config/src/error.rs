//! Configuration Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// None of these are retryable: the user has to fix their configuration.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A file named by the configuration does not exist.
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The configuration file extension is not TOML, YAML or JSON.
    #[display("unknown configuration format: {}", _0.display())]
    UnknownFormat(#[error(not(source))] PathBuf),
    /// Merging or deserializing the layered configuration failed.
    #[display("could not load configuration")]
    Load,
    /// A glob pattern does not compile.
    #[display("invalid glob pattern: {_0}")]
    Glob(#[error(not(source))] String),
    /// The values are individually fine but cannot be combined.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
