//! Checksums as they appear in repository metadata.
//!
//! Every artifact referenced by `repomd.xml`, and every package's `pkgid`, is
//! identified by a hex digest together with the *name* of the algorithm that
//! produced it (`<checksum type="sha256">`). [`ChecksumType`] keeps both: the
//! algorithm, and the spelling used on the wire. The historical name `sha`
//! means SHA-1 and is kept as `sha` so that manifests produced by older tools
//! compare equal.

pub mod error;
mod hasher;

pub use crate::hasher::Hasher;
use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

/// A checksum algorithm, named the way metadata documents name it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChecksumType {
    /// SHA-1 under its legacy name, `sha`.
    Sha,
    Sha1,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl ChecksumType {
    /// The name written into `type="…"` attributes.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumType::Sha => "sha",
            ChecksumType::Sha1 => "sha1",
            ChecksumType::Sha256 => "sha256",
            ChecksumType::Sha384 => "sha384",
            ChecksumType::Sha512 => "sha512",
        }
    }

    /// Length of the hex digest this algorithm produces.
    #[must_use]
    pub fn hex_len(&self) -> usize {
        match self {
            ChecksumType::Sha | ChecksumType::Sha1 => 40,
            ChecksumType::Sha256 => 64,
            ChecksumType::Sha384 => 96,
            ChecksumType::Sha512 => 128,
        }
    }

    /// Start an incremental [`Hasher`].
    #[must_use]
    pub fn hasher(&self) -> Hasher {
        Hasher::new(*self)
    }

    /// Digest an in-memory buffer.
    #[must_use]
    pub fn digest(&self, bytes: impl AsRef<[u8]>) -> Checksum {
        let mut hasher = self.hasher();
        hasher.update(bytes.as_ref());
        hasher.finalize()
    }

    /// Digest everything `reader` yields.
    pub fn digest_reader(&self, mut reader: impl Read) -> Result<Checksum> {
        let mut hasher = self.hasher();
        std::io::copy(&mut reader, &mut hasher).or_raise(|| ErrorKind::Io)?;
        Ok(hasher.finalize())
    }

    /// Digest the file at `path` as stored on disk.
    #[instrument(skip(self), fields(algorithm = %self, path = %path.as_ref().display()))]
    pub fn digest_file(&self, path: impl AsRef<Path>) -> Result<Checksum> {
        let path = path.as_ref();
        let file = File::open(path).or_raise(|| ErrorKind::File(path.to_path_buf()))?;
        self.digest_reader(BufReader::new(file)).or_raise(|| ErrorKind::File(path.to_path_buf()))
    }
}

impl Display for ChecksumType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumType {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "sha" => ChecksumType::Sha,
            "sha1" => ChecksumType::Sha1,
            "sha256" => ChecksumType::Sha256,
            "sha384" => ChecksumType::Sha384,
            "sha512" => ChecksumType::Sha512,
            _ => exn::bail!(ErrorKind::UnsupportedType(s.to_string())),
        })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ChecksumType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ChecksumType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = <std::borrow::Cow<'de, str> as serde::Deserialize>::deserialize(deserializer)?;
        name.parse::<ChecksumType>().map_err(|_| serde::de::Error::custom(format!("unsupported checksum type: {name}")))
    }
}

/// A hex digest tagged with the algorithm that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Checksum {
    kind: ChecksumType,
    value: String,
}

impl Checksum {
    /// Wrap an existing hex digest, e.g. one read back from a prior run's
    /// metadata. The value is normalised to lowercase.
    pub fn new(kind: ChecksumType, value: impl Into<String>) -> Self {
        Self { kind, value: value.into().to_ascii_lowercase() }
    }

    pub fn kind(&self) -> ChecksumType {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.value)
    }
}
