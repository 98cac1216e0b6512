//! The three metadata document streams.
//!
//! Fragments are spooled uncompressed while packages are processed. Only
//! [`MetadataWriter::close`] knows how many packages made it in, so it is the
//! one that writes the compressed documents with their `packages` count.

use crate::error::{ErrorKind, Result};
use crate::fragments::FragmentSet;
use exn::ResultExt;
use repodata_compress::Compression;
use repodata_package::models::DocumentKind;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

const SPOOL_SUFFIX: &str = "spool";

struct Spool {
    kind: DocumentKind,
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Finalized documents in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Documents {
    /// Packages declared in (and written to) each document.
    pub count: usize,
    pub primary: PathBuf,
    pub filelists: PathBuf,
    pub other: PathBuf,
}

impl Documents {
    pub fn path(&self, kind: DocumentKind) -> &Path {
        match kind {
            DocumentKind::Primary => &self.primary,
            DocumentKind::Filelists => &self.filelists,
            DocumentKind::Other => &self.other,
        }
    }
}

/// Appends fragments to all three documents in lockstep.
pub struct MetadataWriter {
    staging: PathBuf,
    expected: usize,
    written: usize,
    spools: Vec<Spool>,
}

impl MetadataWriter {
    /// `expected` is the number of packages planned for this run.
    #[instrument(skip_all, fields(staging = %staging.as_ref().display(), expected))]
    pub fn open(staging: impl AsRef<Path>, expected: usize) -> Result<Self> {
        let staging = staging.as_ref().to_path_buf();
        let mut spools = Vec::with_capacity(DocumentKind::ALL.len());
        for kind in DocumentKind::ALL {
            let path = staging.join(format!("{}.{SPOOL_SUFFIX}", kind.file_name()));
            let file = File::create_new(&path).or_raise(|| ErrorKind::Document(kind))?;
            spools.push(Spool { kind, path, writer: BufWriter::new(file) });
        }
        Ok(Self { staging, expected, written: 0, spools })
    }

    /// Append one package to every document.
    pub fn write_package(&mut self, fragments: &FragmentSet) -> Result<()> {
        for spool in &mut self.spools {
            let fragment = fragments.get(spool.kind);
            spool.writer.write_all(fragment.as_bytes()).or_raise(|| ErrorKind::Document(spool.kind))?;
            spool.writer.write_all(b"\n").or_raise(|| ErrorKind::Document(spool.kind))?;
        }
        self.written += 1;
        Ok(())
    }

    /// Packages written so far.
    pub fn count(&self) -> usize {
        self.written
    }

    /// Write `<kind>.xml.gz` for every document and remove the spools.
    #[instrument(skip(self), fields(staging = %self.staging.display()))]
    pub fn close(self) -> Result<Documents> {
        if self.written != self.expected {
            tracing::warn!(
                expected = self.expected,
                written = self.written,
                "Fewer packages written than planned; declaring the written count"
            );
        }
        for spool in self.spools {
            let kind = spool.kind;
            spool.writer.into_inner().map_err(io::IntoInnerError::into_error).or_raise(|| ErrorKind::Document(kind))?;
            let path = document_path(&self.staging, kind);
            finish(kind, &spool.path, &path, self.written)?;
            fs::remove_file(&spool.path).or_raise(|| ErrorKind::Document(kind))?;
            tracing::debug!(path = %path.display(), count = self.written, "Closed {kind} document");
        }
        Ok(Documents {
            count: self.written,
            primary: document_path(&self.staging, DocumentKind::Primary),
            filelists: document_path(&self.staging, DocumentKind::Filelists),
            other: document_path(&self.staging, DocumentKind::Other),
        })
    }
}

fn document_path(staging: &Path, kind: DocumentKind) -> PathBuf {
    Compression::Gzip.append_extension(staging.join(kind.file_name()))
}

fn finish(kind: DocumentKind, spool: &Path, destination: &Path, count: usize) -> Result<()> {
    let fault = || ErrorKind::Document(kind);
    let output = File::create_new(destination).or_raise(fault)?;
    let mut encoder = Compression::Gzip.encoder(BufWriter::new(output)).or_raise(fault)?;
    encoder.write_all(kind.preamble(count).as_bytes()).or_raise(fault)?;
    let mut body = BufReader::new(File::open(spool).or_raise(fault)?);
    io::copy(&mut body, &mut encoder).or_raise(fault)?;
    encoder.write_all(kind.closing().as_bytes()).or_raise(fault)?;
    encoder.finish().or_raise(fault)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn fragments(name: &str) -> FragmentSet {
        FragmentSet {
            primary: format!("<package type=\"rpm\"><name>{name}</name></package>"),
            filelists: format!("<package pkgid=\"x\" name=\"{name}\" arch=\"noarch\"/>"),
            other: format!("<package pkgid=\"x\" name=\"{name}\" arch=\"noarch\"/>"),
        }
    }

    fn read(path: &Path) -> String {
        let mut text = String::new();
        repodata_compress::open(path).unwrap().read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn test_documents_in_write_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = MetadataWriter::open(dir.path(), 2).unwrap();
        writer.write_package(&fragments("b")).unwrap();
        writer.write_package(&fragments("a")).unwrap();
        assert_eq!(writer.count(), 2);
        let documents = writer.close().unwrap();
        assert_eq!(documents.count, 2);
        assert_eq!(documents.primary, dir.path().join("primary.xml.gz"));
        assert_eq!(
            read(&documents.primary),
            format!(
                "{}{}\n{}\n</metadata>\n",
                DocumentKind::Primary.preamble(2),
                fragments("b").primary,
                fragments("a").primary
            )
        );
        assert!(read(documents.path(DocumentKind::Other)).ends_with("</otherdata>\n"));
        // Only the documents remain.
        let mut names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        names.sort();
        assert_eq!(names, ["filelists.xml.gz", "other.xml.gz", "primary.xml.gz"]);
    }

    #[test]
    fn test_short_run_declares_written_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = MetadataWriter::open(dir.path(), 3).unwrap();
        writer.write_package(&fragments("a")).unwrap();
        let documents = writer.close().unwrap();
        assert!(read(&documents.filelists).contains("packages=\"1\""));
    }

    #[test]
    fn test_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let documents = MetadataWriter::open(dir.path(), 0).unwrap().close().unwrap();
        assert_eq!(read(&documents.primary), format!("{}</metadata>\n", DocumentKind::Primary.preamble(0)));
    }

    #[test]
    fn test_open_refuses_existing_spool() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("primary.xml.spool"), b"").unwrap();
        let err = MetadataWriter::open(dir.path(), 0).err().unwrap();
        assert_eq!(*err, ErrorKind::Document(DocumentKind::Primary));
    }
}
