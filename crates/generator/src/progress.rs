use crate::error::Error;
use std::path::Path;

/// How a package's fragments were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All three fragments were carried over from the previous run.
    Reused,
    /// Some fragments were carried over, the rest rendered fresh.
    Partial,
    /// The archive was read and every fragment rendered fresh.
    Extracted,
}

/// Observer for a run. Purely informational: nothing here can change what
/// gets written.
pub trait Progress {
    fn start(&self, _total: usize) {}

    fn package(&self, _current: usize, _total: usize, _path: &Path, _outcome: Outcome) {}

    /// Called as soon as a package fails, before the next one is looked at.
    fn failed(&self, _path: &Path, _error: &Error) {}

    fn finish(&self) {}
}

/// Reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Progress for Silent {}

impl<T: Progress + ?Sized> Progress for &T {
    fn start(&self, total: usize) {
        (**self).start(total);
    }

    fn package(&self, current: usize, total: usize, path: &Path, outcome: Outcome) {
        (**self).package(current, total, path, outcome);
    }

    fn failed(&self, path: &Path, error: &Error) {
        (**self).failed(path, error);
    }

    fn finish(&self) {
        (**self).finish();
    }
}
