//! Synthetic packages for tests.
//!
//! [`RpmBuilder`] writes archives with a valid lead and headers and an opaque
//! payload, which is all the reader looks at.

use crate::models::{
    ChangelogEntry, Dependency, DependencyFlags, FileKind, HeaderRange, Package, PackageFile, PackageIdentity,
};
use crate::rpm::tags;
use repodata_checksum::ChecksumType;
use std::path::Path;

/// Assembles one header structure.
#[derive(Debug, Default)]
pub struct HeaderBuilder {
    index: Vec<[u32; 4]>,
    store: Vec<u8>,
}

impl HeaderBuilder {
    fn push(&mut self, tag: u32, kind: u32, count: usize, align: usize, data: &[u8]) -> &mut Self {
        while self.store.len() % align != 0 {
            self.store.push(0);
        }
        self.index.push([tag, kind, self.store.len() as u32, count as u32]);
        self.store.extend_from_slice(data);
        self
    }

    pub fn string(&mut self, tag: u32, value: &str) -> &mut Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        self.push(tag, tags::TYPE_STRING, 1, 1, &data)
    }

    pub fn string_array(&mut self, tag: u32, values: &[&str]) -> &mut Self {
        let mut data = Vec::new();
        for value in values {
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        self.push(tag, tags::TYPE_STRING_ARRAY, values.len(), 1, &data)
    }

    pub fn int16(&mut self, tag: u32, values: &[u16]) -> &mut Self {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.push(tag, tags::TYPE_INT16, values.len(), 2, &data)
    }

    pub fn int32(&mut self, tag: u32, values: &[u32]) -> &mut Self {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.push(tag, tags::TYPE_INT32, values.len(), 4, &data)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = vec![0x8e, 0xad, 0xe8, 0x01, 0, 0, 0, 0];
        bytes.extend_from_slice(&(self.index.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&(self.store.len() as u32).to_be_bytes());
        for entry in &self.index {
            for field in entry {
                bytes.extend_from_slice(&field.to_be_bytes());
            }
        }
        bytes.extend_from_slice(&self.store);
        bytes
    }
}

type Entry = (String, u32, String);

fn sense(flags: &str) -> u32 {
    match flags {
        "EQ" => tags::SENSE_EQUAL,
        "LT" => tags::SENSE_LESS,
        "GT" => tags::SENSE_GREATER,
        "LE" => tags::SENSE_LESS | tags::SENSE_EQUAL,
        "GE" => tags::SENSE_GREATER | tags::SENSE_EQUAL,
        other => panic!("unknown flags {other}"),
    }
}

fn entry(name: &str, version: Option<(&str, &str)>) -> Entry {
    match version {
        Some((flags, evr)) => (name.to_string(), sense(flags), evr.to_string()),
        None => (name.to_string(), 0, String::new()),
    }
}

/// Fluent builder for a minimal but well-formed rpm archive.
#[derive(Debug, Clone)]
pub struct RpmBuilder {
    name: String,
    version: String,
    release: String,
    epoch: Option<u32>,
    arch: String,
    source: bool,
    summary: String,
    description: String,
    license: String,
    build_time: u32,
    files: Vec<(String, u16, u32)>,
    provides: Vec<Entry>,
    requires: Vec<Entry>,
    conflicts: Vec<Entry>,
    obsoletes: Vec<Entry>,
    changelogs: Vec<(String, u32, String)>,
    payload: Vec<u8>,
}

impl RpmBuilder {
    pub fn new(name: &str, version: &str, release: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            epoch: None,
            arch: "x86_64".to_string(),
            source: false,
            summary: format!("The {name} package"),
            description: format!("{name} does things."),
            license: "MIT".to_string(),
            build_time: 1_700_000_000,
            files: Vec::new(),
            provides: Vec::new(),
            requires: Vec::new(),
            conflicts: Vec::new(),
            obsoletes: Vec::new(),
            changelogs: Vec::new(),
            payload: format!("payload of {name}").into_bytes(),
        }
    }

    pub fn epoch(mut self, epoch: u32) -> Self {
        self.epoch = Some(epoch);
        self
    }

    pub fn arch(mut self, arch: &str) -> Self {
        self.arch = arch.to_string();
        self
    }

    pub fn source(mut self) -> Self {
        self.source = true;
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = summary.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn license(mut self, license: &str) -> Self {
        self.license = license.to_string();
        self
    }

    pub fn file(mut self, path: &str, mode: u16) -> Self {
        self.files.push((path.to_string(), mode, 0));
        self
    }

    pub fn ghost(mut self, path: &str) -> Self {
        self.files.push((path.to_string(), 0o100644, tags::FILE_GHOST));
        self
    }

    pub fn provides(mut self, name: &str, version: Option<(&str, &str)>) -> Self {
        self.provides.push(entry(name, version));
        self
    }

    pub fn requires(mut self, name: &str, version: Option<(&str, &str)>) -> Self {
        self.requires.push(entry(name, version));
        self
    }

    pub fn pre_requires(mut self, name: &str) -> Self {
        self.requires.push((name.to_string(), tags::SENSE_PREREQ, String::new()));
        self
    }

    pub fn conflicts(mut self, name: &str, version: Option<(&str, &str)>) -> Self {
        self.conflicts.push(entry(name, version));
        self
    }

    pub fn obsoletes(mut self, name: &str, version: Option<(&str, &str)>) -> Self {
        self.obsoletes.push(entry(name, version));
        self
    }

    pub fn changelog(mut self, author: &str, date: u32, text: &str) -> Self {
        self.changelogs.push((author.to_string(), date, text.to_string()));
        self
    }

    /// Replace the payload; changes the archive checksum but not the header.
    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn file_name(&self) -> String {
        let arch = if self.source { "src" } else { self.arch.as_str() };
        format!("{}-{}-{}.{arch}.rpm", self.name, self.version, self.release)
    }

    fn dependencies(header: &mut HeaderBuilder, entries: &[Entry], [names, flags, versions]: [u32; 3]) {
        if entries.is_empty() {
            return;
        }
        let entry_names: Vec<&str> = entries.iter().map(|(name, _, _)| name.as_str()).collect();
        let entry_flags: Vec<u32> = entries.iter().map(|(_, flags, _)| *flags).collect();
        let entry_versions: Vec<&str> = entries.iter().map(|(_, _, evr)| evr.as_str()).collect();
        header.string_array(names, &entry_names);
        header.int32(flags, &entry_flags);
        header.string_array(versions, &entry_versions);
    }

    fn header(&self) -> Vec<u8> {
        let mut header = HeaderBuilder::default();
        header
            .string(tags::NAME, &self.name)
            .string(tags::VERSION, &self.version)
            .string(tags::RELEASE, &self.release)
            .string(tags::SUMMARY, &self.summary)
            .string(tags::DESCRIPTION, &self.description)
            .int32(tags::BUILDTIME, &[self.build_time])
            .string(tags::BUILDHOST, "builder.example.com")
            .int32(tags::SIZE, &[self.files.len() as u32 * 1024])
            .string(tags::LICENSE, &self.license)
            .string(tags::GROUP, "Unspecified")
            .string(tags::URL, "https://example.com")
            .string(tags::ARCH, &self.arch)
            .int32(tags::ARCHIVESIZE, &[self.payload.len() as u32]);
        if let Some(epoch) = self.epoch {
            header.int32(tags::EPOCH, &[epoch]);
        }
        if self.source {
            header.int32(tags::SOURCEPACKAGE, &[1]);
        } else {
            header.string(tags::SOURCERPM, &format!("{}-{}-{}.src.rpm", self.name, self.version, self.release));
        }

        if !self.files.is_empty() {
            let mut dirnames: Vec<&str> = Vec::new();
            let mut basenames = Vec::new();
            let mut indexes = Vec::new();
            for (path, _, _) in &self.files {
                let split = path.rfind('/').map_or(0, |i| i + 1);
                let (dir, base) = path.split_at(split);
                let index = match dirnames.iter().position(|d| *d == dir) {
                    Some(index) => index,
                    None => {
                        dirnames.push(dir);
                        dirnames.len() - 1
                    },
                };
                basenames.push(base);
                indexes.push(index as u32);
            }
            let modes: Vec<u16> = self.files.iter().map(|(_, mode, _)| *mode).collect();
            let flags: Vec<u32> = self.files.iter().map(|(_, _, flags)| *flags).collect();
            header
                .int16(tags::FILEMODES, &modes)
                .int32(tags::FILEFLAGS, &flags)
                .int32(tags::DIRINDEXES, &indexes)
                .string_array(tags::BASENAMES, &basenames)
                .string_array(tags::DIRNAMES, &dirnames);
        }

        Self::dependencies(&mut header, &self.provides, [tags::PROVIDENAME, tags::PROVIDEFLAGS, tags::PROVIDEVERSION]);
        Self::dependencies(&mut header, &self.requires, [tags::REQUIRENAME, tags::REQUIREFLAGS, tags::REQUIREVERSION]);
        Self::dependencies(&mut header, &self.conflicts, [
            tags::CONFLICTNAME,
            tags::CONFLICTFLAGS,
            tags::CONFLICTVERSION,
        ]);
        Self::dependencies(&mut header, &self.obsoletes, [
            tags::OBSOLETENAME,
            tags::OBSOLETEFLAGS,
            tags::OBSOLETEVERSION,
        ]);

        if !self.changelogs.is_empty() {
            let times: Vec<u32> = self.changelogs.iter().map(|(_, date, _)| *date).collect();
            let names: Vec<&str> = self.changelogs.iter().map(|(author, _, _)| author.as_str()).collect();
            let texts: Vec<&str> = self.changelogs.iter().map(|(_, _, text)| text.as_str()).collect();
            header
                .int32(tags::CHANGELOGTIME, &times)
                .string_array(tags::CHANGELOGNAME, &names)
                .string_array(tags::CHANGELOGTEXT, &texts);
        }
        header.build()
    }

    /// The complete archive bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1024);
        bytes.extend_from_slice(&tags::LEAD_MAGIC);
        bytes.extend_from_slice(&[3, 0]);
        bytes.extend_from_slice(&u16::from(self.source).to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        let mut name = [0u8; 66];
        let nvr = format!("{}-{}-{}", self.name, self.version, self.release);
        let len = nvr.len().min(65);
        name[..len].copy_from_slice(&nvr.as_bytes()[..len]);
        bytes.extend_from_slice(&name);
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&5u16.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        debug_assert_eq!(bytes.len(), tags::LEAD_SIZE);

        // Empty signature header; its size is already a multiple of 8.
        bytes.extend_from_slice(&HeaderBuilder::default().build());
        bytes.extend_from_slice(&self.header());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.build())
    }
}

/// A fully populated package value, independent of any archive.
pub fn sample_package() -> Package {
    Package {
        identity: PackageIdentity {
            name: "hello".to_string(),
            epoch: "0".to_string(),
            version: "2.12".to_string(),
            release: "1".to_string(),
            arch: "x86_64".to_string(),
            checksum: ChecksumType::Sha256.digest(b"hello-2.12-1.x86_64.rpm"),
        },
        summary: "Prints a familiar, friendly greeting".to_string(),
        description: "The GNU Hello program produces a familiar, friendly greeting.".to_string(),
        packager: "Example Packager <packager@example.com>".to_string(),
        url: "https://www.gnu.org/software/hello/".to_string(),
        file_time: 1_700_000_100,
        build_time: 1_700_000_000,
        package_size: 4096,
        installed_size: 16384,
        archive_size: 12000,
        license: "GPLv3+".to_string(),
        vendor: String::new(),
        group: "Unspecified".to_string(),
        build_host: "builder.example.com".to_string(),
        source_rpm: "hello-2.12-1.src.rpm".to_string(),
        header_range: HeaderRange { start: 104, end: 2048 },
        provides: vec![Dependency::versioned("hello", DependencyFlags::Eq, "2.12-1")],
        requires: vec![
            Dependency { pre: true, ..Dependency::new("/bin/sh") },
            Dependency::versioned("glibc", DependencyFlags::Ge, "2.34"),
            Dependency::versioned("rpmlib(CompressedFileNames)", DependencyFlags::Le, "3.0.4-1"),
        ],
        conflicts: Vec::new(),
        obsoletes: Vec::new(),
        files: vec![
            PackageFile::new("/usr/bin/hello", FileKind::File),
            PackageFile::new("/usr/share/doc/hello", FileKind::Dir),
            PackageFile::new("/etc/hello.conf", FileKind::File),
            PackageFile::new("/usr/share/doc/hello/README", FileKind::File),
            PackageFile::new("/var/log/hello.log", FileKind::Ghost),
        ],
        changelogs: vec![
            ChangelogEntry {
                author: "Jane <jane@example.com> - 2.12-1".to_string(),
                date: 1_700_000_000,
                text: "- new upstream".to_string(),
            },
            ChangelogEntry {
                author: "Jane <jane@example.com> - 2.10-1".to_string(),
                date: 1_600_000_000,
                text: "- initial package".to_string(),
            },
        ],
    }
}
