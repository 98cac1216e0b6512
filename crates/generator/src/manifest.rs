//! `repomd.xml`: the index of every artifact in the metadata directory.

use crate::error::{ErrorKind, Result};
use crate::scan::href;
use crate::writer::Documents;
use exn::{OptionExt, ResultExt};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use repodata_checksum::{Checksum, ChecksumType};
use repodata_compress::Compression;
use repodata_package::REPO_NS;
use repodata_package::models::{DocumentKind, Location};
use repodata_sqlite::SqliteExporter;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::instrument;

/// File name of the manifest inside the metadata directory.
pub const MANIFEST_NAME: &str = "repomd.xml";

/// One `<data>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    /// `primary`, `filelists_db`, `group`, ...
    pub kind: String,
    pub location: Location,
    /// Of the file as stored.
    pub checksum: Checksum,
    /// Of the decompressed contents; absent for uncompressed artifacts.
    pub open_checksum: Option<Checksum>,
    /// Modification time, seconds since the epoch.
    pub timestamp: i64,
    pub database_version: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryManifest {
    pub entries: Vec<DataEntry>,
}

impl RepositoryManifest {
    pub fn entry(&self, kind: &str) -> Option<&DataEntry> {
        self.entries.iter().find(|entry| entry.kind == kind)
    }

    /// The most recent artifact timestamp, if there are any artifacts.
    pub fn newest_timestamp(&self) -> Option<i64> {
        self.entries.iter().map(|entry| entry.timestamp).max()
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        let fault = || ErrorKind::Manifest;
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None))).or_raise(fault)?;
        writer
            .write_event(Event::Start(BytesStart::new("repomd").with_attributes([("xmlns", REPO_NS)])))
            .or_raise(fault)?;
        for entry in &self.entries {
            writer
                .write_event(Event::Start(BytesStart::new("data").with_attributes([("type", entry.kind.as_str())])))
                .or_raise(fault)?;
            let mut location = BytesStart::new("location");
            if let Some(base) = &entry.location.base {
                location.push_attribute(("xml:base", base.as_str()));
            }
            location.push_attribute(("href", entry.location.href.as_str()));
            writer.write_event(Event::Empty(location)).or_raise(fault)?;
            write_checksum(&mut writer, "checksum", &entry.checksum)?;
            write_text(&mut writer, "timestamp", &entry.timestamp.to_string())?;
            if let Some(open) = &entry.open_checksum {
                write_checksum(&mut writer, "open-checksum", open)?;
            }
            if let Some(version) = entry.database_version {
                write_text(&mut writer, "database_version", &version.to_string())?;
            }
            writer.write_event(Event::End(BytesEnd::new("data"))).or_raise(fault)?;
        }
        writer.write_event(Event::End(BytesEnd::new("repomd"))).or_raise(fault)?;
        let mut xml = writer.into_inner();
        xml.push(b'\n');
        Ok(xml)
    }

    /// Persist as `<directory>/repomd.xml`. The file appears complete or not
    /// at all.
    #[instrument(skip(self), fields(directory = %directory.display()))]
    pub fn write_atomic(&self, directory: &Path) -> Result<PathBuf> {
        let xml = self.to_xml()?;
        let destination = directory.join(MANIFEST_NAME);
        let mut temp = tempfile::NamedTempFile::new_in(directory).or_raise(|| ErrorKind::Manifest)?;
        temp.write_all(&xml).or_raise(|| ErrorKind::Manifest)?;
        temp.as_file().sync_all().or_raise(|| ErrorKind::Manifest)?;
        temp.persist(&destination).or_raise(|| ErrorKind::Manifest)?;
        tracing::info!(path = %destination.display(), entries = self.entries.len(), "Wrote repository manifest");
        Ok(destination)
    }

    /// Parse a published manifest.
    #[instrument(fields(path = %path.display()))]
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).or_raise(|| ErrorKind::Manifest)?;
        let mut reader = Reader::from_reader(BufReader::new(file));
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut manifest = Self::default();
        let mut current: Option<PartialEntry> = None;
        let mut field: Option<ManifestField> = None;
        loop {
            buf.clear();
            match reader.read_event_into(&mut buf).or_raise(|| ErrorKind::Manifest)? {
                Event::Start(element) if element.name().as_ref() == b"data" => {
                    current = Some(PartialEntry { kind: attr(&element, "type")?, ..PartialEntry::default() });
                },
                Event::Start(element) => {
                    let name = element.name();
                    match (name.as_ref(), &mut current) {
                        (b"location", Some(entry)) => entry.location = location(&element)?,
                        (b"checksum", Some(_)) => field = Some(ManifestField::Checksum(checksum_type(&element)?)),
                        (b"open-checksum", Some(_)) => field = Some(ManifestField::Open(checksum_type(&element)?)),
                        (b"timestamp", Some(_)) => field = Some(ManifestField::Timestamp),
                        (b"database_version", Some(_)) => field = Some(ManifestField::DatabaseVersion),
                        _ => {},
                    }
                },
                Event::Empty(element) => {
                    if let (b"location", Some(entry)) = (element.name().as_ref(), &mut current) {
                        entry.location = location(&element)?;
                    }
                },
                Event::Text(text) => {
                    if let (Some(field), Some(entry)) = (field.take(), &mut current) {
                        let text = text.unescape().or_raise(|| ErrorKind::Manifest)?;
                        entry.assign(field, &text)?;
                    }
                },
                Event::End(element) => {
                    field = None;
                    if element.name().as_ref() == b"data"
                        && let Some(entry) = current.take()
                    {
                        manifest.entries.push(entry.finish()?);
                    }
                },
                Event::Eof => break,
                _ => {},
            }
        }
        Ok(manifest)
    }
}

fn write_text(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    let fault = || ErrorKind::Manifest;
    writer.write_event(Event::Start(BytesStart::new(name))).or_raise(fault)?;
    writer.write_event(Event::Text(BytesText::new(text))).or_raise(fault)?;
    writer.write_event(Event::End(BytesEnd::new(name))).or_raise(fault)?;
    Ok(())
}

fn write_checksum(writer: &mut Writer<Vec<u8>>, name: &str, checksum: &Checksum) -> Result<()> {
    let fault = || ErrorKind::Manifest;
    let start = BytesStart::new(name).with_attributes([("type", checksum.kind().as_str())]);
    writer.write_event(Event::Start(start)).or_raise(fault)?;
    writer.write_event(Event::Text(BytesText::new(checksum.value()))).or_raise(fault)?;
    writer.write_event(Event::End(BytesEnd::new(name))).or_raise(fault)?;
    Ok(())
}

enum ManifestField {
    Checksum(ChecksumType),
    Open(ChecksumType),
    Timestamp,
    DatabaseVersion,
}

#[derive(Default)]
struct PartialEntry {
    kind: String,
    location: Location,
    checksum: Option<Checksum>,
    open_checksum: Option<Checksum>,
    timestamp: i64,
    database_version: Option<u32>,
}

impl PartialEntry {
    fn assign(&mut self, field: ManifestField, text: &str) -> Result<()> {
        match field {
            ManifestField::Checksum(kind) => self.checksum = Some(Checksum::new(kind, text.trim())),
            ManifestField::Open(kind) => self.open_checksum = Some(Checksum::new(kind, text.trim())),
            ManifestField::Timestamp => self.timestamp = text.trim().parse::<i64>().or_raise(|| ErrorKind::Manifest)?,
            ManifestField::DatabaseVersion => {
                self.database_version = Some(text.trim().parse::<u32>().or_raise(|| ErrorKind::Manifest)?)
            },
        }
        Ok(())
    }

    fn finish(self) -> Result<DataEntry> {
        Ok(DataEntry {
            checksum: self.checksum.ok_or_raise(|| ErrorKind::Manifest)?,
            kind: self.kind,
            location: self.location,
            open_checksum: self.open_checksum,
            timestamp: self.timestamp,
            database_version: self.database_version,
        })
    }
}

fn attr(element: &BytesStart, key: &str) -> Result<String> {
    let attribute = element.try_get_attribute(key).or_raise(|| ErrorKind::Manifest)?.ok_or_raise(|| ErrorKind::Manifest)?;
    Ok(attribute.unescape_value().or_raise(|| ErrorKind::Manifest)?.into_owned())
}

fn location(element: &BytesStart) -> Result<Location> {
    let base = match element.try_get_attribute("xml:base").or_raise(|| ErrorKind::Manifest)? {
        Some(base) => Some(base.unescape_value().or_raise(|| ErrorKind::Manifest)?.into_owned()),
        None => None,
    };
    Ok(Location::new(attr(element, "href")?, base))
}

fn checksum_type(element: &BytesStart) -> Result<ChecksumType> {
    attr(element, "type")?.parse::<ChecksumType>().or_raise(|| ErrorKind::Manifest)
}

fn modified(path: &Path) -> Result<i64> {
    let modified = fs::metadata(path).and_then(|meta| meta.modified()).or_raise(|| ErrorKind::Manifest)?;
    Ok(OffsetDateTime::from(modified).unix_timestamp())
}

/// Materializes a document as a relational database next to it.
pub trait DatabaseExporter {
    /// Build the database for the staged `kind` document whose compressed
    /// checksum is `checksum`, returning the path it was written to.
    fn export(&self, staging: &Path, kind: DocumentKind, checksum: &Checksum) -> Result<PathBuf>;

    /// Format version recorded as `database_version`.
    fn version(&self) -> u32;
}

impl DatabaseExporter for SqliteExporter {
    fn export(&self, staging: &Path, kind: DocumentKind, checksum: &Checksum) -> Result<PathBuf> {
        SqliteExporter::export(self, staging, kind, checksum).or_raise(|| ErrorKind::Database(kind))
    }

    fn version(&self) -> u32 {
        SqliteExporter::version(self)
    }
}

/// Collects the manifest entries of a staged metadata directory.
pub struct ManifestBuilder<'a> {
    staging: &'a Path,
    /// Published directory name, prefixed to every `href`.
    final_dir: &'a Path,
    checksum: ChecksumType,
    base_url: Option<String>,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(staging: &'a Path, final_dir: &'a Path, checksum: ChecksumType, base_url: Option<String>) -> Self {
        Self { staging, final_dir, checksum, base_url }
    }

    fn location(&self, name: &str) -> Location {
        Location::new(format!("{}/{name}", href(self.final_dir)), self.base_url.clone())
    }

    /// Entries for the three documents, then their databases when `exporter`
    /// is given, then the group file.
    #[instrument(skip_all, fields(staging = %self.staging.display()))]
    pub fn build(
        &self,
        documents: &Documents,
        exporter: Option<&dyn DatabaseExporter>,
        group_file: Option<&Path>,
    ) -> Result<RepositoryManifest> {
        let mut entries = Vec::new();
        for kind in DocumentKind::MANIFEST_ORDER {
            entries.push(self.document(kind, documents.path(kind))?);
        }
        if let Some(exporter) = exporter {
            for kind in DocumentKind::MANIFEST_ORDER {
                let compressed = entries
                    .iter()
                    .find(|entry| entry.kind == kind.as_str())
                    .map(|entry| entry.checksum.clone())
                    .ok_or_raise(|| ErrorKind::Database(kind))?;
                entries.push(self.database(kind, &compressed, exporter)?);
            }
        }
        if let Some(group) = group_file {
            entries.push(self.group(group)?);
        }
        Ok(RepositoryManifest { entries })
    }

    fn document(&self, kind: DocumentKind, path: &Path) -> Result<DataEntry> {
        let fault = || ErrorKind::Document(kind);
        let name = path.file_name().ok_or_raise(fault)?.to_string_lossy().into_owned();
        let checksum = self.checksum.digest_file(path).or_raise(fault)?;
        let open = self.checksum.digest_reader(repodata_compress::open(path).or_raise(fault)?).or_raise(fault)?;
        Ok(DataEntry {
            kind: kind.as_str().to_string(),
            location: self.location(&name),
            checksum,
            open_checksum: Some(open),
            timestamp: modified(path)?,
            database_version: None,
        })
    }

    fn database(&self, kind: DocumentKind, document: &Checksum, exporter: &dyn DatabaseExporter) -> Result<DataEntry> {
        let fault = || ErrorKind::Database(kind);
        let exported = exporter.export(self.staging, kind, document)?;
        let database = self.staging.join(format!("{kind}.sqlite"));
        fs::rename(&exported, &database).or_raise(fault)?;
        let name = format!("{kind}.sqlite{}", Compression::Bzip2.extension());
        let compressed = self.staging.join(&name);
        Compression::Bzip2.compress_file(&database, &compressed).or_raise(fault)?;
        let open = self.checksum.digest_file(&database).or_raise(fault)?;
        let checksum = self.checksum.digest_file(&compressed).or_raise(fault)?;
        fs::remove_file(&database).or_raise(fault)?;
        Ok(DataEntry {
            kind: format!("{kind}_db"),
            location: self.location(&name),
            checksum,
            open_checksum: Some(open),
            timestamp: modified(&compressed)?,
            database_version: Some(exporter.version()),
        })
    }

    /// Copied verbatim; never regenerated.
    fn group(&self, source: &Path) -> Result<DataEntry> {
        let fault = || ErrorKind::Group(source.to_path_buf());
        let name = source.file_name().ok_or_raise(fault)?.to_string_lossy().into_owned();
        let destination = self.staging.join(&name);
        fs::copy(source, &destination).or_raise(fault)?;
        Ok(DataEntry {
            kind: "group".to_string(),
            location: self.location(&name),
            checksum: self.checksum.digest_file(&destination).or_raise(fault)?,
            open_checksum: None,
            timestamp: modified(&destination)?,
            database_version: None,
        })
    }
}
