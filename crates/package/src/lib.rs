//! Package metadata: reading it out of archives and rendering it into the
//! per-package fragments of the `primary`, `filelists` and `other` documents.

mod consts;
mod document;
pub mod error;
pub mod models;
mod render;
pub mod rpm;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::path::Path;

pub use crate::document::{DocumentReader, ParsedPackage};
pub use crate::consts::{COMMON_NS, FILELISTS_NS, OTHER_NS, REPO_NS, RPM_NS, XML_DECLARATION};
use crate::error::Result;
use crate::models::{Package, PackageIdentity};
pub use crate::render::{RenderOptions, xml_clean};
pub use crate::rpm::RpmReader;

/// Turns a package archive into structured metadata.
///
/// Implementations hold whatever per-run context reading needs (for rpm, the
/// checksum algorithm used for package ids). Every error is a per-package
/// fault.
pub trait PackageReader {
    /// Just enough to decide whether a previous run's fragments still apply.
    fn identify(&self, path: &Path) -> Result<PackageIdentity>;

    /// Everything needed to render all three fragments.
    fn read(&self, path: &Path) -> Result<Package>;
}

impl<T: PackageReader + ?Sized> PackageReader for &T {
    fn identify(&self, path: &Path) -> Result<PackageIdentity> {
        (**self).identify(path)
    }

    fn read(&self, path: &Path) -> Result<Package> {
        (**self).read(path)
    }
}
