use super::{ChangelogEntry, Dependency, PackageFile, PackageIdentity};

/// Byte offsets of the main header within the archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderRange {
    pub start: u64,
    pub end: u64,
}

/// Where a package is published, as written in its `<location>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Path relative to the repository (or volume) root, `/`-separated.
    pub href: String,
    /// Optional `xml:base`.
    pub base: Option<String>,
}

impl Location {
    pub fn new(href: impl Into<String>, base: Option<String>) -> Self {
        Self { href: href.into(), base }
    }
}

/// Everything the metadata documents say about one package archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub identity: PackageIdentity,
    pub summary: String,
    pub description: String,
    pub packager: String,
    pub url: String,
    /// Archive modification time, seconds since the Unix epoch.
    pub file_time: u64,
    pub build_time: u64,
    /// Size of the archive on disk.
    pub package_size: u64,
    pub installed_size: u64,
    pub archive_size: u64,
    pub license: String,
    pub vendor: String,
    pub group: String,
    pub build_host: String,
    pub source_rpm: String,
    pub header_range: HeaderRange,
    pub provides: Vec<Dependency>,
    pub requires: Vec<Dependency>,
    pub conflicts: Vec<Dependency>,
    pub obsoletes: Vec<Dependency>,
    pub files: Vec<PackageFile>,
    /// Newest first, as stored in the header.
    pub changelogs: Vec<ChangelogEntry>,
}
