//! SQLite materialization of the repository metadata documents.
//!
//! Produces the `primary`, `filelists` and `other` databases in the
//! long-established yum layout (schema version 10), read back from the XML
//! documents rather than from package archives, so that reused fragments end
//! up in the databases exactly as they appear in the XML.

mod db;
pub mod error;
mod export;

pub use crate::export::{DB_VERSION, SqliteExporter};
