//! Repository metadata generation.
//!
//! A run scans one or more package directories, writes a `primary`,
//! `filelists` and `other` document (reusing the fragments of unchanged
//! packages from the previous run), indexes them in `repomd.xml` and swaps
//! the result into place. See [`MetadataGenerator`].

pub mod error;
mod fragments;
mod generator;
mod manifest;
mod previous;
mod progress;
mod publish;
mod scan;
mod split;
mod writer;

pub use crate::fragments::{FragmentProducer, FragmentSet};
pub use crate::generator::{MetadataGenerator, REPOSITORY_ID, RunSummary};
pub use crate::manifest::{DataEntry, DatabaseExporter, MANIFEST_NAME, ManifestBuilder, RepositoryManifest};
pub use crate::previous::{PreviousRunIndex, Reuse};
pub use crate::progress::{Outcome, Progress, Silent};
pub use crate::publish::Staging;
pub use crate::scan::{DirectoryScanner, PackageFilter, PackageList, PackageSource};
pub use crate::split::{Volume, manifest_base_url, with_fragment};
pub use crate::writer::{Documents, MetadataWriter};
