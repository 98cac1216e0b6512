//! SQLite Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A database export error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for database export operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source document could not be opened or parsed.
    #[display("cannot read metadata document: {}", _0.display())]
    Document(#[error(not(source))] PathBuf),
    #[display("database error")]
    Database,
    /// The private async runtime could not be started.
    #[display("cannot start database runtime")]
    Runtime,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
