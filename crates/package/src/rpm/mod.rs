//! Reading package metadata straight out of `.rpm` archives.
//!
//! Only the lead, the signature header and the main header are read; the
//! compressed payload is never opened. The archive as a whole is checksummed
//! for the package id.

mod header;
pub mod tags;

use self::header::Header;
use crate::PackageReader;
use crate::error::{ErrorKind, Result};
use crate::models::{
    ChangelogEntry, Dependency, DependencyFlags, EntryVersion, FileKind, HeaderRange, Package, PackageFile,
    PackageIdentity,
};
use exn::{OptionExt, ResultExt};
use repodata_checksum::ChecksumType;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::instrument;

/// Headers of one archive, plus where the main header sits in the file.
struct Headers {
    source: bool,
    signature: Header,
    main: Header,
    range: HeaderRange,
}

impl Headers {
    fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).or_raise(|| ErrorKind::File(path.to_path_buf()))?;
        let mut reader = BufReader::new(file);

        let mut lead = [0u8; tags::LEAD_SIZE];
        reader.read_exact(&mut lead).or_raise(|| ErrorKind::NotAPackage)?;
        if lead[..4] != tags::LEAD_MAGIC {
            exn::bail!(ErrorKind::NotAPackage);
        }
        let source = u16::from_be_bytes([lead[6], lead[7]]) == tags::LEAD_TYPE_SOURCE;

        let (signature, signature_size) = Header::read(&mut reader)?;
        // The signature header is padded to an 8-byte boundary.
        let padding = (8 - signature_size % 8) % 8;
        std::io::copy(&mut (&mut reader).take(padding), &mut std::io::sink())
            .or_raise(|| ErrorKind::MalformedHeader("truncated signature padding".to_string()))?;

        let start = tags::LEAD_SIZE as u64 + signature_size + padding;
        let (main, main_size) = Header::read(&mut reader)?;
        Ok(Self { source, signature, main, range: HeaderRange { start, end: start + main_size } })
    }

    fn required(&self, tag: u32, name: &'static str) -> Result<String> {
        self.main.string(tag)?.ok_or_raise(|| ErrorKind::MissingTag(name))
    }

    fn text(&self, tag: u32) -> Result<String> {
        Ok(self.main.string(tag)?.unwrap_or_default())
    }

    fn identity(&self, checksum: repodata_checksum::Checksum) -> Result<PackageIdentity> {
        let arch = match self.source || self.main.contains(tags::SOURCEPACKAGE) {
            true => "src".to_string(),
            false => self.required(tags::ARCH, "arch")?,
        };
        Ok(PackageIdentity {
            name: self.required(tags::NAME, "name")?,
            epoch: self.main.number(tags::EPOCH)?.unwrap_or(0).to_string(),
            version: self.required(tags::VERSION, "version")?,
            release: self.required(tags::RELEASE, "release")?,
            arch,
            checksum,
        })
    }

    fn dependencies(&self, names: u32, flags: u32, versions: u32) -> Result<Vec<Dependency>> {
        let names = self.main.strings(names)?;
        let flags = self.main.numbers(flags)?;
        let versions = self.main.strings(versions)?;
        if (!flags.is_empty() && flags.len() != names.len()) || (!versions.is_empty() && versions.len() != names.len()) {
            exn::bail!(ErrorKind::MalformedHeader("dependency arrays differ in length".to_string()));
        }
        Ok(names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let bits = flags.get(i).copied().unwrap_or(0) as u32;
                let sense = match bits & (tags::SENSE_LESS | tags::SENSE_GREATER | tags::SENSE_EQUAL) {
                    tags::SENSE_EQUAL => Some(DependencyFlags::Eq),
                    tags::SENSE_LESS => Some(DependencyFlags::Lt),
                    tags::SENSE_GREATER => Some(DependencyFlags::Gt),
                    s if s == tags::SENSE_LESS | tags::SENSE_EQUAL => Some(DependencyFlags::Le),
                    s if s == tags::SENSE_GREATER | tags::SENSE_EQUAL => Some(DependencyFlags::Ge),
                    _ => None,
                };
                Dependency {
                    name,
                    flags: sense,
                    version: versions.get(i).and_then(|evr| EntryVersion::parse(evr)),
                    pre: bits & (tags::SENSE_PREREQ | tags::SENSE_SCRIPT_PRE | tags::SENSE_SCRIPT_POST) != 0,
                }
            })
            .collect())
    }

    fn files(&self) -> Result<Vec<PackageFile>> {
        let basenames = self.main.strings(tags::BASENAMES)?;
        let paths = if basenames.is_empty() {
            self.main.strings(tags::OLDFILENAMES)?
        } else {
            let dirnames = self.main.strings(tags::DIRNAMES)?;
            let indexes = self.main.numbers(tags::DIRINDEXES)?;
            if indexes.len() != basenames.len() {
                exn::bail!(ErrorKind::MalformedHeader("file arrays differ in length".to_string()));
            }
            basenames
                .iter()
                .zip(&indexes)
                .map(|(base, index)| {
                    let dir = dirnames
                        .get(*index as usize)
                        .ok_or_raise(|| ErrorKind::MalformedHeader(format!("directory index {index} out of range")))?;
                    Ok(format!("{dir}{base}"))
                })
                .collect::<Result<Vec<_>>>()?
        };
        let modes = self.main.numbers(tags::FILEMODES)?;
        let flags = self.main.numbers(tags::FILEFLAGS)?;
        Ok(paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                let flags = flags.get(i).copied().unwrap_or(0) as u32;
                let mode = modes.get(i).copied().unwrap_or(0) as u32;
                let kind = if flags & tags::FILE_GHOST != 0 {
                    FileKind::Ghost
                } else if mode & tags::MODE_TYPE_MASK == tags::MODE_DIR {
                    FileKind::Dir
                } else {
                    FileKind::File
                };
                PackageFile { path, kind }
            })
            .collect())
    }

    fn changelogs(&self) -> Result<Vec<ChangelogEntry>> {
        let times = self.main.numbers(tags::CHANGELOGTIME)?;
        let names = self.main.strings(tags::CHANGELOGNAME)?;
        let texts = self.main.strings(tags::CHANGELOGTEXT)?;
        if names.len() != times.len() || texts.len() != times.len() {
            exn::bail!(ErrorKind::MalformedHeader("changelog arrays differ in length".to_string()));
        }
        Ok(times
            .into_iter()
            .zip(names)
            .zip(texts)
            .map(|((date, author), text)| ChangelogEntry { author, date, text })
            .collect())
    }
}

/// [`PackageReader`] for rpm archives on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpmReader {
    checksum: ChecksumType,
}

impl RpmReader {
    pub fn new(checksum: ChecksumType) -> Self {
        Self { checksum }
    }

    fn checksum(&self, path: &Path) -> Result<repodata_checksum::Checksum> {
        self.checksum.digest_file(path).or_raise(|| ErrorKind::Checksum)
    }
}

impl PackageReader for RpmReader {
    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    fn identify(&self, path: &Path) -> Result<PackageIdentity> {
        let headers = Headers::read(path)?;
        headers.identity(self.checksum(path)?)
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    fn read(&self, path: &Path) -> Result<Package> {
        let headers = Headers::read(path)?;
        let metadata = std::fs::metadata(path).or_raise(|| ErrorKind::File(path.to_path_buf()))?;
        let file_time = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |since| since.as_secs());
        let main = &headers.main;
        let installed_size = match main.number(tags::LONGSIZE)? {
            Some(size) => size,
            None => main.number(tags::SIZE)?.unwrap_or(0),
        };
        let archive_size = match main.number(tags::ARCHIVESIZE)? {
            Some(size) => size,
            None => headers.signature.number(tags::SIG_PAYLOADSIZE)?.unwrap_or(0),
        };
        Ok(Package {
            identity: headers.identity(self.checksum(path)?)?,
            summary: headers.text(tags::SUMMARY)?,
            description: headers.text(tags::DESCRIPTION)?,
            packager: headers.text(tags::PACKAGER)?,
            url: headers.text(tags::URL)?,
            file_time,
            build_time: main.number(tags::BUILDTIME)?.unwrap_or(0),
            package_size: metadata.len(),
            installed_size,
            archive_size,
            license: headers.text(tags::LICENSE)?,
            vendor: headers.text(tags::VENDOR)?,
            group: headers.text(tags::GROUP)?,
            build_host: headers.text(tags::BUILDHOST)?,
            source_rpm: headers.text(tags::SOURCERPM)?,
            header_range: headers.range,
            provides: headers.dependencies(tags::PROVIDENAME, tags::PROVIDEFLAGS, tags::PROVIDEVERSION)?,
            requires: headers.dependencies(tags::REQUIRENAME, tags::REQUIREFLAGS, tags::REQUIREVERSION)?,
            conflicts: headers.dependencies(tags::CONFLICTNAME, tags::CONFLICTFLAGS, tags::CONFLICTVERSION)?,
            obsoletes: headers.dependencies(tags::OBSOLETENAME, tags::OBSOLETEFLAGS, tags::OBSOLETEVERSION)?,
            files: headers.files()?,
            changelogs: headers.changelogs()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RpmBuilder;
    use rstest::rstest;

    fn write(builder: RpmBuilder) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(builder.file_name());
        builder.write_to(&path).unwrap();
        (dir, path)
    }

    #[test]
    fn test_identify() {
        let (_dir, path) = write(RpmBuilder::new("hello", "2.12", "1").epoch(3));
        let identity = RpmReader::default().identify(&path).unwrap();
        assert_eq!(identity.to_string(), "hello-2.12-1.x86_64");
        assert_eq!(identity.epoch, "3");
        assert_eq!(identity.checksum, ChecksumType::Sha256.digest_file(&path).unwrap());
    }

    #[test]
    fn test_read_full_package() {
        let builder = RpmBuilder::new("hello", "2.12", "1")
            .summary("Prints a greeting")
            .license("GPLv3+")
            .file("/usr/bin/hello", 0o100755)
            .file("/usr/share/doc/hello", 0o040755)
            .ghost("/var/log/hello.log")
            .provides("hello", Some(("EQ", "2.12-1")))
            .requires("glibc", Some(("GE", "2.34")))
            .pre_requires("/bin/sh")
            .changelog("Jane <jane@example.com> - 2.12-1", 1_700_000_000, "- new upstream");
        let (_dir, path) = write(builder);
        let package = RpmReader::new(ChecksumType::Sha1).read(&path).unwrap();

        assert_eq!(package.summary, "Prints a greeting");
        assert_eq!(package.license, "GPLv3+");
        assert_eq!(package.identity.checksum.kind(), ChecksumType::Sha1);
        assert_eq!(package.package_size, std::fs::metadata(&path).unwrap().len());
        assert_eq!(
            package.files,
            vec![
                PackageFile::new("/usr/bin/hello", FileKind::File),
                PackageFile::new("/usr/share/doc/hello", FileKind::Dir),
                PackageFile::new("/var/log/hello.log", FileKind::Ghost),
            ]
        );
        assert_eq!(package.provides, vec![Dependency::versioned("hello", DependencyFlags::Eq, "2.12-1")]);
        assert_eq!(package.requires.len(), 2);
        assert!(package.requires[1].pre);
        assert_eq!(package.changelogs[0].date, 1_700_000_000);
        assert!(package.header_range.start > tags::LEAD_SIZE as u64);
        assert!(package.header_range.end <= package.package_size);
    }

    #[test]
    fn test_source_package_arch() {
        let (_dir, path) = write(RpmBuilder::new("hello", "2.12", "1").source());
        assert_eq!(RpmReader::default().identify(&path).unwrap().arch, "src");
    }

    #[rstest]
    #[case(b"definitely not an rpm".to_vec())]
    #[case(Vec::new())]
    fn test_not_a_package(#[case] bytes: Vec<u8>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.rpm");
        std::fs::write(&path, bytes).unwrap();
        let err = RpmReader::default().read(&path).unwrap_err();
        assert_eq!(*err, ErrorKind::NotAPackage);
    }

    #[test]
    fn test_truncated_header() {
        let bytes = RpmBuilder::new("hello", "1", "1").build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.rpm");
        std::fs::write(&path, &bytes[..tags::LEAD_SIZE + 40]).unwrap();
        let err = RpmReader::default().read(&path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MalformedHeader(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RpmReader::default().identify(Path::new("/nonexistent/a.rpm")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::File(_)));
    }
}
