//! Finding the packages of one directory.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use globset::{Glob, GlobSet, GlobSetBuilder};
use repodata_config::RunConfig;
use std::path::{Path, PathBuf};
use tracing::instrument;
use walkdir::WalkDir;

const PACKAGE_EXTENSION: &str = "rpm";

/// Strategy that lists the packages of a (volume) directory.
///
/// Paths are returned relative to `base.join(directory)`, in the order they
/// will appear in the documents.
pub trait PackageSource {
    fn scan(&self, base: &Path, directory: &Path) -> Result<Vec<PathBuf>>;
}

/// Recursively walks the directory for `*.rpm` files.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    skip_symlinks: bool,
    /// Directory names never descended into (staging, published, backup).
    reserved: Vec<PathBuf>,
}

impl DirectoryScanner {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            skip_symlinks: config.skip_symlinks,
            reserved: config.reserved_names().iter().map(|name| name.to_path_buf()).collect(),
        }
    }

    fn is_package(path: &Path) -> bool {
        path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case(PACKAGE_EXTENSION))
    }
}

impl PackageSource for DirectoryScanner {
    #[instrument(skip(self), fields(base = %base.display(), directory = %directory.display()))]
    fn scan(&self, base: &Path, directory: &Path) -> Result<Vec<PathBuf>> {
        let root = base.join(directory);
        let walker = WalkDir::new(&root)
            .follow_links(!self.skip_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !self.reserved.iter().any(|name| entry.file_name() == name.as_os_str())
            });
        let mut packages = Vec::new();
        for entry in walker {
            let entry = entry.or_raise(|| ErrorKind::Scan(root.clone()))?;
            // Unfollowed symlinks report their own type and are never files.
            if entry.file_type().is_file() && Self::is_package(entry.path()) {
                let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                packages.push(relative.to_path_buf());
            }
        }
        tracing::debug!(count = packages.len(), "Scanned directory");
        Ok(packages)
    }
}

/// A fixed list of packages, in the given order.
#[derive(Debug, Clone, Default)]
pub struct PackageList {
    paths: Vec<PathBuf>,
}

impl PackageList {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl PackageSource for PackageList {
    fn scan(&self, _base: &Path, _directory: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.paths.clone())
    }
}

/// Include and exclude globs, matched against the relative package path.
#[derive(Debug, Clone)]
pub struct PackageFilter {
    includes: Option<GlobSet>,
    excludes: GlobSet,
}

impl PackageFilter {
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self> {
        let includes = match includes.is_empty() {
            true => None,
            false => Some(Self::build(includes)?),
        };
        Ok(Self { includes, excludes: Self::build(excludes)? })
    }

    pub fn from_config(config: &RunConfig) -> Result<Self> {
        Self::new(&config.includes, &config.excludes)
    }

    fn build(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern).or_raise(|| ErrorKind::Filter(pattern.clone()))?);
        }
        builder.build().or_raise(|| ErrorKind::Filter(patterns.join(", ")))
    }

    pub fn allows(&self, relative: &Path) -> bool {
        if let Some(includes) = &self.includes
            && !includes.is_match(relative)
        {
            return false;
        }
        !self.excludes.is_match(relative)
    }
}

/// The `href` of a relative package path: always `/`-separated.
pub(crate) fn href(relative: &Path) -> String {
    relative.components().map(|part| part.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for path in [
            "b-1.0-1.noarch.rpm",
            "a-1.0-1.noarch.RPM",
            "sub/c-1.0-1.x86_64.rpm",
            "sub/c-debuginfo-1.0-1.x86_64.rpm",
            "notes.txt",
            "repodata/stale.rpm",
            ".repodata/partial.rpm",
        ] {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"x").unwrap();
        }
        dir
    }

    #[test]
    fn test_directory_scanner_order_and_reserved() {
        let dir = tree();
        let scanner = DirectoryScanner::new(&RunConfig::default());
        let found = scanner.scan(dir.path(), Path::new(".")).unwrap();
        assert_eq!(
            found,
            vec![
                PathBuf::from("a-1.0-1.noarch.RPM"),
                PathBuf::from("b-1.0-1.noarch.rpm"),
                PathBuf::from("sub/c-1.0-1.x86_64.rpm"),
                PathBuf::from("sub/c-debuginfo-1.0-1.x86_64.rpm"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_skip_symlinks() {
        let dir = tree();
        std::os::unix::fs::symlink(dir.path().join("b-1.0-1.noarch.rpm"), dir.path().join("link.rpm")).unwrap();
        let follow = DirectoryScanner::new(&RunConfig::default());
        assert_eq!(follow.scan(dir.path(), Path::new(".")).unwrap().len(), 5);
        let skip = DirectoryScanner::new(&RunConfig { skip_symlinks: true, ..RunConfig::default() });
        assert_eq!(skip.scan(dir.path(), Path::new(".")).unwrap().len(), 4);
    }

    #[test]
    fn test_missing_directory() {
        let err = DirectoryScanner::new(&RunConfig::default()).scan(Path::new("/nonexistent"), Path::new("x")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Scan(_)));
    }

    #[rstest]
    #[case(&[], &["*debuginfo*"], "sub/c-debuginfo-1.0-1.x86_64.rpm", false)]
    #[case(&[], &["*debuginfo*"], "sub/c-1.0-1.x86_64.rpm", true)]
    #[case(&["sub/*"], &[], "a-1.0-1.noarch.rpm", false)]
    #[case(&["sub/*"], &["*debuginfo*"], "sub/c-1.0-1.x86_64.rpm", true)]
    #[case(&["sub/*"], &["*debuginfo*"], "sub/c-debuginfo-1.0-1.x86_64.rpm", false)]
    fn test_filter(#[case] includes: &[&str], #[case] excludes: &[&str], #[case] path: &str, #[case] allowed: bool) {
        let owned = |patterns: &[&str]| patterns.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        let filter = PackageFilter::new(&owned(includes), &owned(excludes)).unwrap();
        assert_eq!(filter.allows(Path::new(path)), allowed);
    }

    #[test]
    fn test_bad_glob() {
        let err = PackageFilter::new(&[], &["a[".to_string()]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Filter(_)));
    }

    #[test]
    fn test_href_uses_forward_slashes() {
        assert_eq!(href(&Path::new("sub").join("c.rpm")), "sub/c.rpm");
    }
}
