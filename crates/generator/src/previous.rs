//! Fragments of the previously published run, keyed by package identity.
//!
//! Loading is best effort: whatever cannot be read just means fewer hits.

use crate::error::{ErrorKind, Result};
use crate::manifest::{MANIFEST_NAME, RepositoryManifest};
use exn::{OptionExt, ResultExt};
use repodata_checksum::{Checksum, ChecksumType};
use repodata_config::RunConfig;
use repodata_package::models::{DocumentKind, Location, PackageIdentity};
use repodata_package::{DocumentReader, ParsedPackage};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::instrument;

/// Fragments found for one package. At least one is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reuse {
    pub primary: Option<String>,
    pub filelists: Option<String>,
    pub other: Option<String>,
}

#[derive(Debug, Default)]
struct Cached {
    /// The primary fragment embeds the location it was written with.
    primary: Option<(Location, String)>,
    filelists: Option<String>,
    other: Option<String>,
}

#[derive(Debug, Default)]
pub struct PreviousRunIndex {
    entries: HashMap<PackageIdentity, Cached>,
}

impl PreviousRunIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The index for this run: empty unless reuse is enabled and the previous
    /// metadata can be read.
    #[instrument(skip_all)]
    pub fn load(config: &RunConfig) -> Self {
        if !config.update {
            return Self::empty();
        }
        let root = config.previous_root();
        let manifest = root.join(&config.final_dir).join(MANIFEST_NAME);
        if !manifest.is_file() {
            tracing::warn!(path = %manifest.display(), "No previous metadata to reuse");
            return Self::empty();
        }
        match Self::read(&root, &manifest, config.checksum) {
            Ok(index) => {
                tracing::info!(packages = index.len(), "Loaded previous metadata");
                index
            },
            Err(err) => {
                tracing::warn!(path = %manifest.display(), error = ?err, "Ignoring unreadable previous metadata");
                Self::empty()
            },
        }
    }

    /// Index the documents listed in the manifest at `manifest`, resolving
    /// their locations against `root`.
    pub fn read(root: &Path, manifest: &Path, checksum: ChecksumType) -> Result<Self> {
        let manifest = RepositoryManifest::read(manifest)?;
        let mut index = Self::default();
        for kind in DocumentKind::ALL {
            let entry = manifest.entry(kind.as_str()).ok_or_raise(|| ErrorKind::Document(kind))?;
            let mut text = String::new();
            repodata_compress::open(root.join(&entry.location.href))
                .or_raise(|| ErrorKind::Document(kind))?
                .read_to_string(&mut text)
                .or_raise(|| ErrorKind::Document(kind))?;
            index.add_document(kind, &text, checksum)?;
        }
        Ok(index)
    }

    fn add_document(&mut self, kind: DocumentKind, text: &str, checksum: ChecksumType) -> Result<()> {
        for package in DocumentReader::new(text.as_bytes()) {
            let (span, parsed) = package.or_raise(|| ErrorKind::Document(kind))?;
            let Some(identity) = identity(kind, &parsed, checksum) else {
                continue;
            };
            // Indented fragments own the whitespace that precedes them on their line.
            let before = text.get(..span.start).ok_or_raise(|| ErrorKind::Document(kind))?;
            let start = before.trim_end_matches([' ', '\t']).len();
            let fragment = text.get(start..span.end).ok_or_raise(|| ErrorKind::Document(kind))?.to_string();
            let cached = self.entries.entry(identity).or_default();
            match kind {
                DocumentKind::Primary => {
                    cached.primary.get_or_insert((parsed.location, fragment));
                },
                DocumentKind::Filelists => {
                    cached.filelists.get_or_insert(fragment);
                },
                DocumentKind::Other => {
                    cached.other.get_or_insert(fragment);
                },
            }
        }
        Ok(())
    }

    /// Remove and return the fragments recorded for `identity`.
    ///
    /// A primary fragment written for a different `location` is dropped.
    pub fn take(&mut self, identity: &PackageIdentity, location: &Location) -> Option<Reuse> {
        let cached = self.entries.remove(identity)?;
        let primary = cached.primary.and_then(|(previous, fragment)| (previous == *location).then_some(fragment));
        let reuse = Reuse { primary, filelists: cached.filelists, other: cached.other };
        (reuse != Reuse::default()).then_some(reuse)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The identity a fragment was written for. Fragments whose package id was
/// produced by another checksum algorithm cannot match and yield `None`.
fn identity(kind: DocumentKind, parsed: &ParsedPackage, checksum: ChecksumType) -> Option<PackageIdentity> {
    let matches = match kind {
        DocumentKind::Primary => parsed.checksum_type.as_deref().and_then(|name| name.parse::<ChecksumType>().ok()) == Some(checksum),
        // No type is recorded outside primary; the digest length has to do.
        DocumentKind::Filelists | DocumentKind::Other => parsed.pkgid.len() == checksum.hex_len(),
    };
    matches.then(|| PackageIdentity {
        name: parsed.name.clone(),
        epoch: parsed.epoch.clone(),
        version: parsed.version.clone(),
        release: parsed.release.clone(),
        arch: parsed.arch.clone(),
        checksum: Checksum::new(checksum, parsed.pkgid.as_str()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::DataEntry;
    use repodata_compress::Compression;
    use repodata_package::RenderOptions;
    use repodata_package::testing::sample_package;
    use rstest::rstest;

    fn document(kind: DocumentKind, fragments: &[String]) -> String {
        let mut text = kind.preamble(fragments.len());
        for fragment in fragments {
            text.push_str(fragment);
            text.push('\n');
        }
        text.push_str(&kind.closing());
        text
    }

    fn indexed(location: &Location, kinds: &[DocumentKind]) -> (PreviousRunIndex, Vec<String>) {
        let package = sample_package();
        let mut index = PreviousRunIndex::empty();
        let mut fragments = Vec::new();
        for kind in kinds {
            let fragment = package.render(*kind, location, &RenderOptions { pretty: true, ..RenderOptions::default() });
            index.add_document(*kind, &document(*kind, &[fragment.clone()]), ChecksumType::Sha256).unwrap();
            fragments.push(fragment);
        }
        (index, fragments)
    }

    #[test]
    fn test_take_returns_exact_fragments_once() {
        let location = Location::new("Packages/hello.rpm", None);
        let (mut index, fragments) = indexed(&location, &DocumentKind::ALL);
        assert_eq!(index.len(), 1);
        let identity = sample_package().identity;
        let reuse = index.take(&identity, &location).unwrap();
        assert_eq!(reuse.primary.as_ref(), Some(&fragments[0]));
        assert_eq!(reuse.filelists.as_ref(), Some(&fragments[1]));
        assert_eq!(reuse.other.as_ref(), Some(&fragments[2]));
        assert_eq!(index.take(&identity, &location), None);
    }

    #[test]
    fn test_moved_package_drops_primary_only() {
        let (mut index, _) = indexed(&Location::new("old/hello.rpm", None), &DocumentKind::ALL);
        let reuse = index.take(&sample_package().identity, &Location::new("new/hello.rpm", None)).unwrap();
        assert_eq!(reuse.primary, None);
        assert!(reuse.filelists.is_some());
        assert!(reuse.other.is_some());
    }

    #[test]
    fn test_partial_previous_run() {
        let location = Location::new("hello.rpm", None);
        let (mut index, _) = indexed(&location, &[DocumentKind::Filelists]);
        let reuse = index.take(&sample_package().identity, &location).unwrap();
        assert_eq!((reuse.primary, reuse.other), (None, None));
        assert!(reuse.filelists.is_some());
    }

    #[test]
    fn test_changed_checksum_misses() {
        let location = Location::new("hello.rpm", None);
        let (mut index, _) = indexed(&location, &DocumentKind::ALL);
        let mut identity = sample_package().identity;
        identity.checksum = ChecksumType::Sha256.digest(b"rebuilt");
        assert_eq!(index.take(&identity, &location), None);
    }

    #[test]
    fn test_other_algorithm_is_ignored() {
        let location = Location::new("hello.rpm", None);
        let primary = sample_package().render(DocumentKind::Primary, &location, &RenderOptions::default());
        let mut index = PreviousRunIndex::empty();
        index.add_document(DocumentKind::Primary, &document(DocumentKind::Primary, &[primary]), ChecksumType::Sha1).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_every_package_of_a_document_is_indexed() {
        let location = Location::new("hello.rpm", None);
        let fragments: Vec<String> = ["alpha", "bravo", "charlie"]
            .iter()
            .map(|name| {
                let mut package = sample_package();
                package.identity.name = name.to_string();
                package.render(DocumentKind::Other, &location, &RenderOptions::default())
            })
            .collect();
        let mut index = PreviousRunIndex::empty();
        index.add_document(DocumentKind::Other, &document(DocumentKind::Other, &fragments), ChecksumType::Sha256).unwrap();
        assert_eq!(index.len(), 3);
        let mut charlie = sample_package().identity;
        charlie.name = "charlie".to_string();
        assert_eq!(index.take(&charlie, &location).unwrap().other.as_ref(), Some(&fragments[2]));
    }

    #[rstest]
    #[case(Compression::Xz)]
    #[case(Compression::Zstd)]
    #[case(Compression::Bzip2)]
    fn test_read_documents_in_other_formats(#[case] format: Compression) {
        let root = tempfile::tempdir().unwrap();
        let metadata = root.path().join("repodata");
        std::fs::create_dir(&metadata).unwrap();
        let location = Location::new("hello.rpm", None);
        let package = sample_package();
        let mut entries = Vec::new();
        for kind in DocumentKind::MANIFEST_ORDER {
            let text = document(kind, &[package.render(kind, &location, &RenderOptions::default())]);
            let name = format!("{}{}", kind.file_name(), format.extension());
            std::fs::write(metadata.join(&name), format.compress(text.as_bytes()).unwrap()).unwrap();
            entries.push(DataEntry {
                kind: kind.as_str().to_string(),
                location: Location::new(format!("repodata/{name}"), None),
                checksum: ChecksumType::Sha256.digest(&name),
                open_checksum: None,
                timestamp: 0,
                database_version: None,
            });
        }
        let manifest = RepositoryManifest { entries }.write_atomic(&metadata).unwrap();
        let mut index = PreviousRunIndex::read(root.path(), &manifest, ChecksumType::Sha256).unwrap();
        let reuse = index.take(&package.identity, &location).unwrap();
        assert!(reuse.primary.is_some() && reuse.filelists.is_some() && reuse.other.is_some());
    }

    #[test]
    fn test_load_without_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            update: true,
            directories: vec![dir.path().to_path_buf()],
            ..RunConfig::default()
        };
        assert!(PreviousRunIndex::load(&config).is_empty());
    }

    #[test]
    fn test_load_with_corrupt_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("repodata")).unwrap();
        std::fs::write(dir.path().join("repodata").join(MANIFEST_NAME), b"<repomd><data type=").unwrap();
        let config = RunConfig {
            update: true,
            directories: vec![dir.path().to_path_buf()],
            ..RunConfig::default()
        };
        assert!(PreviousRunIndex::load(&config).is_empty());
    }
}
