use crate::error::{ErrorKind, Result};
use crate::previous::{PreviousRunIndex, Reuse};
use crate::progress::Outcome;
use exn::ResultExt;
use repodata_package::models::{DocumentKind, Location, Package};
use repodata_package::{PackageReader, RenderOptions};
use std::path::Path;
use tracing::instrument;

/// The three fragments of one package, ready to be appended to the documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentSet {
    pub primary: String,
    pub filelists: String,
    pub other: String,
}

impl FragmentSet {
    pub fn get(&self, kind: DocumentKind) -> &str {
        match kind {
            DocumentKind::Primary => &self.primary,
            DocumentKind::Filelists => &self.filelists,
            DocumentKind::Other => &self.other,
        }
    }

    fn render(package: &Package, location: &Location, options: &RenderOptions) -> Self {
        Self {
            primary: package.render(DocumentKind::Primary, location, options),
            filelists: package.render(DocumentKind::Filelists, location, options),
            other: package.render(DocumentKind::Other, location, options),
        }
    }
}

/// Turns one package path into its fragments, reusing what a previous run
/// already rendered whenever the archive is unchanged.
pub struct FragmentProducer<R> {
    reader: R,
    options: RenderOptions,
}

impl<R: PackageReader> FragmentProducer<R> {
    pub fn new(reader: R, options: RenderOptions) -> Self {
        Self { reader, options }
    }

    /// Every failure is a per-package fault tagged with `path`.
    #[instrument(skip(self, location, index), fields(path = %path.display()))]
    pub fn produce(
        &self,
        path: &Path,
        location: &Location,
        index: &mut PreviousRunIndex,
    ) -> Result<(FragmentSet, Outcome)> {
        let fault = || ErrorKind::Package(path.to_path_buf());
        if !index.is_empty() {
            let identity = self.reader.identify(path).or_raise(fault)?;
            if let Some(reuse) = index.take(&identity, location) {
                if let Reuse { primary: Some(primary), filelists: Some(filelists), other: Some(other) } = reuse {
                    tracing::debug!(package = %identity, "Reusing all fragments");
                    return Ok((FragmentSet { primary, filelists, other }, Outcome::Reused));
                }
                let package = self.reader.read(path).or_raise(fault)?;
                tracing::debug!(package = %identity, "Reusing some fragments");
                let render = |kind| package.render(kind, location, &self.options);
                let fragments = FragmentSet {
                    primary: reuse.primary.unwrap_or_else(|| render(DocumentKind::Primary)),
                    filelists: reuse.filelists.unwrap_or_else(|| render(DocumentKind::Filelists)),
                    other: reuse.other.unwrap_or_else(|| render(DocumentKind::Other)),
                };
                return Ok((fragments, Outcome::Partial));
            }
        }
        let package = self.reader.read(path).or_raise(fault)?;
        Ok((FragmentSet::render(&package, location, &self.options), Outcome::Extracted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repodata_package::RpmReader;
    use repodata_package::testing::RpmBuilder;

    #[test]
    fn test_extracts_without_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.rpm");
        RpmBuilder::new("hello", "2.12", "1").file("/usr/bin/hello", 0o100755).write_to(&path).unwrap();
        let producer = FragmentProducer::new(RpmReader::default(), RenderOptions::default());
        let location = Location::new("hello.rpm", None);
        let (fragments, outcome) = producer.produce(&path, &location, &mut PreviousRunIndex::empty()).unwrap();
        assert_eq!(outcome, Outcome::Extracted);
        assert!(fragments.primary.starts_with("<package type=\"rpm\">"));
        assert!(fragments.primary.contains("<location href=\"hello.rpm\"/>"));
        assert!(fragments.filelists.contains("<file>/usr/bin/hello</file>"));
        assert!(fragments.other.starts_with("<package pkgid="));
        // Rendering is pure.
        let (again, _) = producer.produce(&path, &location, &mut PreviousRunIndex::empty()).unwrap();
        assert_eq!(fragments, again);
    }

    #[test]
    fn test_unreadable_package_is_tagged_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.rpm");
        std::fs::write(&path, b"definitely not an rpm").unwrap();
        let producer = FragmentProducer::new(RpmReader::default(), RenderOptions::default());
        let err = producer.produce(&path, &Location::new("broken.rpm", None), &mut PreviousRunIndex::empty()).unwrap_err();
        assert_eq!(*err, ErrorKind::Package(path));
    }
}
