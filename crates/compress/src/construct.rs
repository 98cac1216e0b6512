use crate::Compression;
use crate::error::{Error, ErrorKind};
use std::{path::Path, str::FromStr};

/// Detection table: format, file extension (without dot), magic bytes, accepted names.
const FORMATS: &[(Compression, &str, &[u8], &[&str])] = &[
    (Compression::Bzip2, "bz2", &[0x42, 0x5A, 0x68], &["bz2", "bzip2"]),
    (Compression::Gzip, "gz", &[0x1F, 0x8B], &["gz", "gzip"]),
    #[cfg(feature = "xz")]
    (Compression::Xz, "xz", &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00], &["xz", "lzma"]),
    #[cfg(feature = "zstd")]
    (Compression::Zstd, "zst", &[0x28, 0xB5, 0x2F, 0xFD], &["zst", "zstd"]),
];

/// Names of formats that exist but were compiled out.
const DISABLED: &[&str] = &[
    #[cfg(not(feature = "xz"))]
    "xz",
    #[cfg(not(feature = "xz"))]
    "lzma",
    #[cfg(not(feature = "zstd"))]
    "zst",
    #[cfg(not(feature = "zstd"))]
    "zstd",
];

impl FromStr for Compression {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        if name == "none" {
            return Ok(Compression::None);
        }
        if let Some((format, ..)) = FORMATS.iter().find(|(.., names)| names.contains(&name.as_str())) {
            return Ok(*format);
        }
        if DISABLED.contains(&name.as_str()) {
            exn::bail!(ErrorKind::DisabledFormat(s.to_string()));
        }
        exn::bail!(ErrorKind::UnsupportedFormat(s.to_string()))
    }
}

impl Compression {
    /// Detect compression from a file extension, e.g. `primary.xml.gz` or
    /// `primary.sqlite.bz2`. Unknown or missing extensions are uncompressed.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let Some(ext) = path.as_ref().extension().and_then(|ext| ext.to_str()) else {
            return Compression::None;
        };
        FORMATS
            .iter()
            .find(|(_, known, ..)| known.eq_ignore_ascii_case(ext))
            .map(|(format, ..)| *format)
            .unwrap_or(Compression::None)
    }

    /// Detect compression format from magic bytes.
    ///
    /// Returns the `None` variant if no magic bytes match or if the input is
    /// too short to detect any format.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        FORMATS
            .iter()
            .find(|(_, _, magic, _)| bytes.starts_with(magic))
            .map(|(format, ..)| *format)
            .unwrap_or(Compression::None)
    }

    /// Prefer the extension; fall back to sniffing `head` when the extension
    /// says nothing. Prior-run documents are sometimes published without a
    /// compression suffix.
    #[must_use]
    pub fn detect(path: impl AsRef<Path>, head: &[u8]) -> Self {
        match Self::from_path(path) {
            Compression::None => Self::from_magic_bytes(head),
            known => known,
        }
    }
}
