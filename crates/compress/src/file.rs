//! File-level helpers used by the manifest builder.

use crate::Compression;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read};
use std::path::Path;

/// Open `path` for reading its *decompressed* contents.
///
/// The format is taken from the extension, falling back to the file's magic
/// bytes when the extension is not a known compression suffix.
pub fn open(path: impl AsRef<Path>) -> Result<Box<dyn Read>> {
    let path = path.as_ref();
    let file = File::open(path).or_raise(|| ErrorKind::File(path.to_path_buf()))?;
    let mut reader = BufReader::new(file);
    let head = reader.fill_buf().or_raise(|| ErrorKind::Io)?;
    let format = Compression::detect(path, head);
    format.decoder(reader)
}

impl Compression {
    /// Compress the file at `source` into a new file at `destination`,
    /// returning the number of uncompressed bytes read.
    pub fn compress_file(&self, source: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<u64> {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        let input = File::open(source).or_raise(|| ErrorKind::File(source.to_path_buf()))?;
        let output = File::create(destination).or_raise(|| ErrorKind::File(destination.to_path_buf()))?;
        let size = self.compress_stream(BufReader::new(input), BufWriter::new(output))?;
        tracing::debug!(
            source = %source.display(),
            destination = %destination.display(),
            format = %self,
            size,
            "Compressed file"
        );
        Ok(size)
    }
}
