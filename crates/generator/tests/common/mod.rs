#![allow(dead_code)]

use repodata_config::RunConfig;
use repodata_generator::error::Error;
use repodata_generator::{Outcome, Progress};
use repodata_package::testing::RpmBuilder;
use std::cell::RefCell;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch repository directory with packages under `Packages/`.
pub struct Repo {
    dir: TempDir,
}

impl Repo {
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `package` to `<root>/<subdir>/<file name>`.
    pub fn add_in(&self, subdir: &str, package: &RpmBuilder) -> PathBuf {
        let directory = self.root().join(subdir);
        std::fs::create_dir_all(&directory).unwrap();
        let path = directory.join(package.file_name());
        package.write_to(&path).unwrap();
        path
    }

    pub fn add(&self, package: &RpmBuilder) -> PathBuf {
        self.add_in("Packages", package)
    }

    pub fn config(&self) -> RunConfig {
        RunConfig { directories: vec![self.root().to_path_buf()], ..RunConfig::default() }
    }

    pub fn published(&self, name: &str) -> PathBuf {
        self.root().join("repodata").join(name)
    }

    /// Decompressed contents of a published document.
    pub fn document(&self, name: &str) -> String {
        let mut text = String::new();
        repodata_compress::open(self.published(name)).unwrap().read_to_string(&mut text).unwrap();
        text
    }
}

pub fn package(name: &str) -> RpmBuilder {
    RpmBuilder::new(name, "1.0", "1")
        .arch("noarch")
        .file(&format!("/usr/bin/{name}"), 0o100755)
        .file(&format!("/usr/share/doc/{name}"), 0o040755)
        .requires("glibc", Some(("GE", "2.17")))
        .changelog("Packager <packager@example.com>", 1_700_000_000, "- Initial build")
}

/// Three packages, in scan order.
pub fn three_packages(repo: &Repo) -> Vec<PathBuf> {
    ["alpha", "bravo", "charlie"].iter().map(|name| repo.add(&package(name))).collect()
}

/// The value of the root element's `packages` attribute.
pub fn declared_count(document: &str) -> usize {
    let start = document.find("packages=\"").unwrap() + "packages=\"".len();
    let end = start + document[start..].find('"').unwrap();
    document[start..end].parse().unwrap()
}

/// Number of top-level `<package` elements.
pub fn fragment_count(document: &str) -> usize {
    document.lines().filter(|line| line.starts_with("<package")).count()
}

#[derive(Default)]
pub struct RecordingProgress {
    pub started: RefCell<Option<usize>>,
    pub packages: RefCell<Vec<(PathBuf, Outcome)>>,
    pub failures: RefCell<Vec<PathBuf>>,
    pub finished: RefCell<bool>,
}

impl RecordingProgress {
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.packages.borrow().iter().map(|(_, outcome)| *outcome).collect()
    }
}

impl Progress for RecordingProgress {
    fn start(&self, total: usize) {
        *self.started.borrow_mut() = Some(total);
    }

    fn package(&self, _current: usize, _total: usize, path: &Path, outcome: Outcome) {
        self.packages.borrow_mut().push((path.to_path_buf(), outcome));
    }

    fn failed(&self, path: &Path, _error: &Error) {
        self.failures.borrow_mut().push(path.to_path_buf());
    }

    fn finish(&self) {
        *self.finished.borrow_mut() = true;
    }
}
