//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::{Compression as BzCompression, read::MultiBzDecoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::MultiGzDecoder};
use std::io::{Read, Write};
use tracing::instrument;
#[cfg(feature = "xz")]
use xz2::read::XzDecoder;
#[cfg(feature = "zstd")]
use zstd::stream::read::Decoder as ZstdDecoder;

// Levels are fixed: changing one changes every compressed checksum in the
// manifest, so they are not configurable.
pub(crate) const BZIP2_LEVEL: BzCompression = BzCompression::best();
pub(crate) const GZIP_LEVEL: GzCompression = GzCompression::best();
#[cfg(feature = "xz")]
pub(crate) const XZ_LEVEL: u32 = 9;
#[cfg(feature = "zstd")]
pub(crate) const ZSTD_LEVEL: i32 = 19;

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use repodata_compress::Compression;
    ///
    /// let compressed = Compression::Gzip.compress(b"<otherdata/>").unwrap();
    /// assert_eq!(Compression::Gzip.decompress(&compressed).unwrap(), b"<otherdata/>");
    /// ```
    #[instrument(skip(input), fields(format = %self, input_size = input.len()))]
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = self.encoder(Vec::new())?;
        encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
        encoder.finish()
    }

    /// Decompress a byte slice in memory.
    #[instrument(skip(input), fields(format = %self, input_size = input.len()))]
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.decoder(input)?.read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
        Ok(output)
    }

    /// Wrap a reader with the appropriate decompression layer.
    ///
    /// Gzip and Bzip2 decoders accept multi-member streams, which some
    /// third-party tools produce when appending to compressed metadata.
    pub fn decoder<'a, R: Read + 'a>(&self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => Box::new(reader),
            Compression::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
            Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzDecoder::new(reader)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Box::new(ZstdDecoder::new(reader).or_raise(|| ErrorKind::Encoder)?),
        })
    }

    /// Compress everything from `reader` into `writer`, returning the number
    /// of uncompressed bytes consumed.
    pub fn compress_stream<R: Read, W: Write>(&self, mut reader: R, writer: W) -> Result<u64> {
        let mut encoder = self.encoder(writer)?;
        let copied = std::io::copy(&mut reader, &mut encoder).or_raise(|| ErrorKind::Io)?;
        encoder.finish()?;
        Ok(copied)
    }
}
