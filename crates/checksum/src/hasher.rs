use crate::{Checksum, ChecksumType};
use sha1::Sha1;
use sha2::digest::DynDigest;
use sha2::{Sha256, Sha384, Sha512};
use std::io::{self, Write};

/// Incremental digest over one of the supported algorithms.
///
/// Implements [`Write`] so it can sit at the end of an [`io::copy`], or
/// behind a decompressing reader to compute an open-checksum without
/// buffering a whole document.
pub struct Hasher {
    kind: ChecksumType,
    inner: Box<dyn DynDigest>,
}

impl Hasher {
    pub fn new(kind: ChecksumType) -> Self {
        let inner: Box<dyn DynDigest> = match kind {
            ChecksumType::Sha | ChecksumType::Sha1 => Box::new(Sha1::default()),
            ChecksumType::Sha256 => Box::new(Sha256::default()),
            ChecksumType::Sha384 => Box::new(Sha384::default()),
            ChecksumType::Sha512 => Box::new(Sha512::default()),
        };
        Self { kind, inner }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finalize(self) -> Checksum {
        Checksum::new(self.kind, hex::encode(self.inner.finalize()))
    }
}

impl Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
