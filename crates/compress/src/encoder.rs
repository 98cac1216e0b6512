//! Streaming encoder with an explicit, fallible finish.

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::write::BzEncoder;
use exn::ResultExt;
use flate2::GzBuilder;
use flate2::write::GzEncoder;
use std::io::{self, Write};
#[cfg(feature = "xz")]
use xz2::write::XzEncoder;
#[cfg(feature = "zstd")]
use zstd::stream::write::Encoder as ZstdEncoder;

/// A compressing writer.
///
/// Unlike a boxed `dyn Write`, dropping an `Encoder` is *not* a clean way to
/// end the stream: trailers are only written (and errors only surfaced) by
/// [`finish`](Self::finish). A metadata document that was dropped without
/// finishing is truncated and must not be published.
pub enum Encoder<W: Write> {
    None(W),
    Bzip2(BzEncoder<W>),
    Gzip(GzEncoder<W>),
    #[cfg(feature = "xz")]
    Xz(XzEncoder<W>),
    #[cfg(feature = "zstd")]
    Zstd(ZstdEncoder<'static, W>),
}

impl Compression {
    /// Wrap `writer` in a compressing [`Encoder`].
    pub fn encoder<W: Write>(&self, writer: W) -> Result<Encoder<W>> {
        Ok(match self {
            Compression::None => Encoder::None(writer),
            Compression::Bzip2 => Encoder::Bzip2(BzEncoder::new(writer, crate::ops::BZIP2_LEVEL)),
            // No filename, zero mtime: the header must not vary between runs.
            Compression::Gzip => Encoder::Gzip(GzBuilder::new().mtime(0).write(writer, crate::ops::GZIP_LEVEL)),
            #[cfg(feature = "xz")]
            Compression::Xz => Encoder::Xz(XzEncoder::new(writer, crate::ops::XZ_LEVEL)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Encoder::Zstd(
                ZstdEncoder::new(writer, crate::ops::ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?,
            ),
        })
    }
}

impl<W: Write> Encoder<W> {
    /// Write the stream trailer and return the inner writer.
    pub fn finish(self) -> Result<W> {
        let mut inner = match self {
            Encoder::None(writer) => writer,
            Encoder::Bzip2(encoder) => encoder.finish().or_raise(|| ErrorKind::Io)?,
            Encoder::Gzip(encoder) => encoder.finish().or_raise(|| ErrorKind::Io)?,
            #[cfg(feature = "xz")]
            Encoder::Xz(encoder) => encoder.finish().or_raise(|| ErrorKind::Io)?,
            #[cfg(feature = "zstd")]
            Encoder::Zstd(encoder) => encoder.finish().or_raise(|| ErrorKind::Io)?,
        };
        inner.flush().or_raise(|| ErrorKind::Io)?;
        Ok(inner)
    }

    fn as_write(&mut self) -> &mut dyn Write {
        match self {
            Encoder::None(writer) => writer,
            Encoder::Bzip2(encoder) => encoder,
            Encoder::Gzip(encoder) => encoder,
            #[cfg(feature = "xz")]
            Encoder::Xz(encoder) => encoder,
            #[cfg(feature = "zstd")]
            Encoder::Zstd(encoder) => encoder,
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.as_write().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.as_write().flush()
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Bzip2)]
    #[case(Compression::Gzip)]
    #[cfg_attr(feature = "xz", case(Compression::Xz))]
    #[cfg_attr(feature = "zstd", case(Compression::Zstd))]
    fn test_encoder_finish_produces_decodable_stream(#[case] format: Compression) {
        let mut encoder = format.encoder(Vec::new()).unwrap();
        encoder.write_all(b"<metadata packages=\"0\">\n").unwrap();
        encoder.write_all(b"</metadata>\n").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(format.decompress(&compressed).unwrap(), b"<metadata packages=\"0\">\n</metadata>\n");
    }

    #[test]
    fn test_gzip_encoder_is_deterministic() {
        let encode = || {
            let mut encoder = Compression::Gzip.encoder(Vec::new()).unwrap();
            encoder.write_all(b"identical content").unwrap();
            encoder.finish().unwrap()
        };
        let first = encode();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(first, encode());
    }
}
