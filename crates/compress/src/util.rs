use crate::Compression;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl Compression {
    /// Returns the file extension (with leading dot) for this format.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Bzip2 => ".bz2",
            Compression::Gzip => ".gz",
            #[cfg(feature = "xz")]
            Compression::Xz => ".xz",
            #[cfg(feature = "zstd")]
            Compression::Zstd => ".zst",
        }
    }

    /// Returns the short name used in configuration and logs.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Bzip2 => "bzip2",
            Compression::Gzip => "gzip",
            #[cfg(feature = "xz")]
            Compression::Xz => "xz",
            #[cfg(feature = "zstd")]
            Compression::Zstd => "zstd",
        }
    }

    /// Append this format's extension to `path`: `primary.sqlite` becomes
    /// `primary.sqlite.bz2`.
    #[must_use]
    pub fn append_extension(&self, path: impl AsRef<Path>) -> PathBuf {
        let mut name = path.as_ref().as_os_str().to_owned();
        name.push(self.extension());
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case(Compression::None, "primary.xml")]
    #[case(Compression::Bzip2, "primary.xml.bz2")]
    #[case(Compression::Gzip, "primary.xml.gz")]
    #[cfg_attr(feature = "xz", case(Compression::Xz, "primary.xml.xz"))]
    #[cfg_attr(feature = "zstd", case(Compression::Zstd, "primary.xml.zst"))]
    fn test_append_extension(#[case] format: Compression, #[case] expected: &str) {
        assert_eq!(format.append_extension("primary.xml"), PathBuf::from(expected));
    }

    #[test]
    fn test_display_matches_name() {
        assert_eq!(Compression::Gzip.to_string(), "gzip");
        assert_eq!(Compression::Bzip2.as_str().parse::<Compression>().unwrap(), Compression::Bzip2);
    }
}
