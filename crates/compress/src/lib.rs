//! Compression and decompression for repository metadata artifacts.
//!
//! This crate wraps several compression libraries behind a unified
//! [`Compression`] enum, providing:
//!
//! - **Format detection** from file extensions ([`Compression::from_path`]) or
//!   magic bytes ([`Compression::from_magic_bytes`])
//! - **In-memory** compression/decompression ([`Compression::compress`],
//!   [`Compression::decompress`])
//! - **Streaming** via an [`Encoder`] that must be explicitly
//!   [`finish`](Encoder::finish)ed, and boxed decoding readers
//! - **File** helpers ([`Compression::compress_file`], [`open`])
//!
//! Output is deterministic: the same input always produces the same bytes.
//! Gzip headers carry no filename and a zero modification time, so a document
//! rebuilt from identical content checksums identically across runs.
//!
//! Bzip2 and Gzip are always available. Optional formats (XZ, Zstd) are behind
//! feature flags.

mod construct;
mod encoder;
pub mod error;
mod file;
mod ops;
mod util;

pub use crate::encoder::Encoder;
pub use crate::file::open;

/// A supported compression format.
///
/// Variants gated behind feature flags (`xz`, `zstd`) are only available when
/// the corresponding feature is enabled. Defaults to [`None`](Self::None)
/// (uncompressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Bzip2 compression (.bz2), used for the SQLite databases.
    Bzip2,
    /// Gzip compression (.gz), used for the XML documents.
    Gzip,
    /// XZ/LZMA compression (.xz)
    #[cfg(feature = "xz")]
    Xz,
    /// Zstd compression (.zst)
    #[cfg(feature = "zstd")]
    Zstd,
}
