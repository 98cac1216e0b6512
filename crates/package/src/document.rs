//! Streaming reader for already written metadata documents.
//!
//! Yields one [`ParsedPackage`] per top-level `<package>` element together
//! with the element's byte span in the input, so callers can either load the
//! values or copy the fragment verbatim.

use crate::error::{ErrorKind, Result};
use crate::models::{ChangelogEntry, Dependency, DependencyFlags, EntryVersion, FileKind, Location, PackageFile};
use exn::ResultExt;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::BufRead;
use std::ops::Range;

/// Values of one `<package>` element, from whichever document it came from.
///
/// Fields a document does not carry are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPackage {
    pub pkgid: String,
    /// `type` of the primary `<checksum>`; absent in filelists and other.
    pub checksum_type: Option<String>,
    pub name: String,
    pub arch: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub summary: String,
    pub description: String,
    pub packager: String,
    pub url: String,
    pub file_time: u64,
    pub build_time: u64,
    pub package_size: u64,
    pub installed_size: u64,
    pub archive_size: u64,
    pub location: Location,
    pub license: String,
    pub vendor: String,
    pub group: String,
    pub build_host: String,
    pub source_rpm: String,
    pub header_start: u64,
    pub header_end: u64,
    pub provides: Vec<Dependency>,
    pub requires: Vec<Dependency>,
    pub conflicts: Vec<Dependency>,
    pub obsoletes: Vec<Dependency>,
    pub files: Vec<PackageFile>,
    pub changelogs: Vec<ChangelogEntry>,
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Provides,
    Requires,
    Conflicts,
    Obsoletes,
}

#[derive(Debug)]
enum Field {
    Name,
    Arch,
    Checksum,
    Summary,
    Description,
    Packager,
    Url,
    License,
    Vendor,
    Group,
    BuildHost,
    SourceRpm,
    File(FileKind),
    Changelog { author: String, date: u64 },
}

fn malformed(reason: impl Into<String>) -> ErrorKind {
    ErrorKind::MalformedDocument(reason.into())
}

fn attr(element: &BytesStart, key: &str) -> Result<Option<String>> {
    let Some(attribute) = element.try_get_attribute(key).or_raise(|| malformed(format!("bad attribute {key}")))?
    else {
        return Ok(None);
    };
    let value = attribute.unescape_value().or_raise(|| malformed(format!("bad attribute value for {key}")))?;
    Ok(Some(value.into_owned()))
}

fn number(element: &BytesStart, key: &str) -> Result<u64> {
    match attr(element, key)? {
        Some(value) => value.parse::<u64>().or_raise(|| malformed(format!("{key}={value:?} is not a number"))),
        None => Ok(0),
    }
}

fn dependency(element: &BytesStart) -> Result<Dependency> {
    let name = attr(element, "name")?.unwrap_or_default();
    let flags = attr(element, "flags")?
        .map(|flags| flags.parse::<DependencyFlags>())
        .transpose()
        .or_raise(|| malformed("bad dependency flags"))?;
    let version = match attr(element, "ver")? {
        Some(version) => Some(EntryVersion {
            epoch: attr(element, "epoch")?.unwrap_or_else(|| "0".to_string()),
            version,
            release: attr(element, "rel")?,
        }),
        None => None,
    };
    let pre = attr(element, "pre")?.is_some_and(|pre| pre == "1");
    Ok(Dependency { name, flags, version, pre })
}

impl ParsedPackage {
    fn open(&mut self, element: &BytesStart, section: &mut Option<Section>) -> Result<Option<Field>> {
        Ok(Some(match element.name().as_ref() {
            b"name" => Field::Name,
            b"arch" => Field::Arch,
            b"checksum" => {
                self.checksum_type = attr(element, "type")?;
                Field::Checksum
            },
            b"summary" => Field::Summary,
            b"description" => Field::Description,
            b"packager" => Field::Packager,
            b"url" => Field::Url,
            b"rpm:license" => Field::License,
            b"rpm:vendor" => Field::Vendor,
            b"rpm:group" => Field::Group,
            b"rpm:buildhost" => Field::BuildHost,
            b"rpm:sourcerpm" => Field::SourceRpm,
            b"file" => Field::File(FileKind::from_attr(attr(element, "type")?.as_deref())),
            b"changelog" => Field::Changelog {
                author: attr(element, "author")?.unwrap_or_default(),
                date: number(element, "date")?,
            },
            b"version" => {
                self.epoch = attr(element, "epoch")?.unwrap_or_else(|| "0".to_string());
                self.version = attr(element, "ver")?.unwrap_or_default();
                self.release = attr(element, "rel")?.unwrap_or_default();
                return Ok(None);
            },
            b"time" => {
                self.file_time = number(element, "file")?;
                self.build_time = number(element, "build")?;
                return Ok(None);
            },
            b"size" => {
                self.package_size = number(element, "package")?;
                self.installed_size = number(element, "installed")?;
                self.archive_size = number(element, "archive")?;
                return Ok(None);
            },
            b"location" => {
                self.location = Location::new(attr(element, "href")?.unwrap_or_default(), attr(element, "xml:base")?);
                return Ok(None);
            },
            b"rpm:header-range" => {
                self.header_start = number(element, "start")?;
                self.header_end = number(element, "end")?;
                return Ok(None);
            },
            b"rpm:provides" => {
                *section = Some(Section::Provides);
                return Ok(None);
            },
            b"rpm:requires" => {
                *section = Some(Section::Requires);
                return Ok(None);
            },
            b"rpm:conflicts" => {
                *section = Some(Section::Conflicts);
                return Ok(None);
            },
            b"rpm:obsoletes" => {
                *section = Some(Section::Obsoletes);
                return Ok(None);
            },
            b"rpm:entry" => {
                let entry = dependency(element)?;
                match section {
                    Some(Section::Provides) => self.provides.push(entry),
                    Some(Section::Requires) => self.requires.push(entry),
                    Some(Section::Conflicts) => self.conflicts.push(entry),
                    Some(Section::Obsoletes) => self.obsoletes.push(entry),
                    None => exn::bail!(malformed("rpm:entry outside a dependency list")),
                }
                return Ok(None);
            },
            _ => return Ok(None),
        }))
    }

    fn assign(&mut self, field: Field, text: String) {
        match field {
            Field::Name => self.name = text,
            Field::Arch => self.arch = text,
            Field::Checksum => self.pkgid = text,
            Field::Summary => self.summary = text,
            Field::Description => self.description = text,
            Field::Packager => self.packager = text,
            Field::Url => self.url = text,
            Field::License => self.license = text,
            Field::Vendor => self.vendor = text,
            Field::Group => self.group = text,
            Field::BuildHost => self.build_host = text,
            Field::SourceRpm => self.source_rpm = text,
            Field::File(kind) => self.files.push(PackageFile { path: text, kind }),
            Field::Changelog { author, date } => self.changelogs.push(ChangelogEntry { author, date, text }),
        }
    }
}

/// Pulls packages out of a `primary`, `filelists` or `other` document.
pub struct DocumentReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    /// Element nesting, carried across calls.
    depth: usize,
}

impl<R: BufRead> DocumentReader<R> {
    pub fn new(inner: R) -> Self {
        Self { reader: Reader::from_reader(inner), buf: Vec::with_capacity(4096), depth: 0 }
    }

    /// The next package and the byte span of its element, or `None` at the
    /// end of the document.
    pub fn next_package(&mut self) -> Result<Option<(Range<usize>, ParsedPackage)>> {
        let mut package: Option<(usize, ParsedPackage)> = None;
        let mut section = None;
        let mut field: Option<(Field, String)> = None;
        loop {
            let before = self.reader.buffer_position() as usize;
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf).or_raise(|| {
                malformed(format!("invalid XML at byte {}", self.reader.error_position()))
            })?;
            match event {
                Event::Start(element) => {
                    self.depth += 1;
                    // The root is depth 1, packages are its children.
                    if self.depth == 2 && element.name().as_ref() == b"package" {
                        let parsed = ParsedPackage {
                            pkgid: attr(&element, "pkgid")?.unwrap_or_default(),
                            name: attr(&element, "name")?.unwrap_or_default(),
                            arch: attr(&element, "arch")?.unwrap_or_default(),
                            ..ParsedPackage::default()
                        };
                        package = Some((before, parsed));
                    } else if let Some((_, parsed)) = &mut package {
                        field = parsed.open(&element, &mut section)?.map(|field| (field, String::new()));
                    }
                },
                Event::Empty(element) => {
                    if let Some((_, parsed)) = &mut package
                        && let Some(empty) = parsed.open(&element, &mut section)?
                    {
                        parsed.assign(empty, String::new());
                    }
                },
                Event::Text(text) => {
                    if let Some((_, buffer)) = &mut field {
                        buffer.push_str(&text.unescape().or_raise(|| malformed("bad text content"))?);
                    }
                },
                Event::CData(data) => {
                    if let Some((_, buffer)) = &mut field {
                        buffer.push_str(&String::from_utf8_lossy(&data));
                    }
                },
                Event::End(element) => {
                    self.depth = self.depth.saturating_sub(1);
                    match element.name().as_ref() {
                        b"package" if self.depth == 1 && package.is_some() => {
                            let end = self.reader.buffer_position() as usize;
                            return Ok(package.take().map(|(start, parsed)| (start..end, parsed)));
                        },
                        b"rpm:provides" | b"rpm:requires" | b"rpm:conflicts" | b"rpm:obsoletes" => section = None,
                        _ => {
                            if let Some((_, parsed)) = &mut package
                                && let Some((open, text)) = field.take()
                            {
                                parsed.assign(open, text);
                            }
                        },
                    }
                },
                Event::Eof => {
                    if package.is_some() {
                        exn::bail!(malformed("document ends inside a package"));
                    }
                    return Ok(None);
                },
                _ => {},
            }
        }
    }
}

impl<R: BufRead> Iterator for DocumentReader<R> {
    type Item = Result<(Range<usize>, ParsedPackage)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_package().transpose()
    }
}
