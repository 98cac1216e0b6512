//! Per-package fragment rendering.
//!
//! Rendering is a pure function of the [`Package`], its [`Location`] and the
//! [`RenderOptions`]: the same inputs always produce the same bytes, which is
//! what allows a previous run's fragments to stand in for fresh ones.

use crate::consts::{PRIMARY_DIR_REGEX, PRIMARY_FILE_REGEX};
use crate::models::{Dependency, DocumentKind, FileKind, Location, Package, PackageFile};
use quick_xml::escape::{escape, partial_escape};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Newline and indent every element.
    pub pretty: bool,
    /// Keep only the newest N changelog entries.
    pub changelog_limit: Option<usize>,
}

impl Package {
    /// Render the fragment for one document.
    pub fn render(&self, kind: DocumentKind, location: &Location, options: &RenderOptions) -> String {
        match kind {
            DocumentKind::Primary => self.primary(location, options),
            DocumentKind::Filelists => self.filelists(options),
            DocumentKind::Other => self.other(options),
        }
    }

    pub fn primary(&self, location: &Location, options: &RenderOptions) -> String {
        let id = &self.identity;
        let mut xml = Fragment::new(options.pretty);
        xml.open("package", &[("type", "rpm")]);
        xml.text("name", &[], &id.name);
        xml.text("arch", &[], &id.arch);
        self.version(&mut xml);
        xml.text("checksum", &[("type", id.checksum.kind().as_str()), ("pkgid", "YES")], id.pkgid());
        xml.text("summary", &[], &self.summary);
        xml.text("description", &[], &self.description);
        xml.text("packager", &[], &self.packager);
        xml.text("url", &[], &self.url);
        xml.empty("time", &[("file", &self.file_time.to_string()), ("build", &self.build_time.to_string())]);
        xml.empty(
            "size",
            &[
                ("package", &self.package_size.to_string()),
                ("installed", &self.installed_size.to_string()),
                ("archive", &self.archive_size.to_string()),
            ],
        );
        match &location.base {
            Some(base) => xml.empty("location", &[("xml:base", base), ("href", &location.href)]),
            None => xml.empty("location", &[("href", &location.href)]),
        }

        xml.open("format", &[]);
        xml.text("rpm:license", &[], &self.license);
        xml.text("rpm:vendor", &[], &self.vendor);
        xml.text("rpm:group", &[], &self.group);
        xml.text("rpm:buildhost", &[], &self.build_host);
        xml.text("rpm:sourcerpm", &[], &self.source_rpm);
        xml.empty(
            "rpm:header-range",
            &[("start", &self.header_range.start.to_string()), ("end", &self.header_range.end.to_string())],
        );
        entries(&mut xml, "rpm:provides", self.provides.iter());
        entries(&mut xml, "rpm:requires", self.requires.iter().filter(|dep| !dep.is_rpmlib()));
        entries(&mut xml, "rpm:conflicts", self.conflicts.iter());
        entries(&mut xml, "rpm:obsoletes", self.obsoletes.iter());
        files(&mut xml, self.files.iter().filter(|file| is_primary_file(file)));
        xml.close("format");
        xml.close("package");
        xml.finish()
    }

    pub fn filelists(&self, options: &RenderOptions) -> String {
        let mut xml = Fragment::new(options.pretty);
        self.open_with_pkgid(&mut xml);
        self.version(&mut xml);
        files(&mut xml, self.files.iter());
        xml.close("package");
        xml.finish()
    }

    pub fn other(&self, options: &RenderOptions) -> String {
        let limit = options.changelog_limit.unwrap_or(usize::MAX);
        let mut xml = Fragment::new(options.pretty);
        self.open_with_pkgid(&mut xml);
        self.version(&mut xml);
        for entry in self.changelogs.iter().take(limit) {
            xml.text("changelog", &[("author", &entry.author), ("date", &entry.date.to_string())], &entry.text);
        }
        xml.close("package");
        xml.finish()
    }

    fn open_with_pkgid(&self, xml: &mut Fragment) {
        let id = &self.identity;
        xml.open("package", &[("pkgid", id.pkgid()), ("name", &id.name), ("arch", &id.arch)]);
    }

    fn version(&self, xml: &mut Fragment) {
        let id = &self.identity;
        xml.empty("version", &[("epoch", &id.epoch), ("ver", &id.version), ("rel", &id.release)]);
    }
}

fn is_primary_file(file: &PackageFile) -> bool {
    match file.kind {
        FileKind::Dir => PRIMARY_DIR_REGEX.is_match(&file.path),
        FileKind::File | FileKind::Ghost => PRIMARY_FILE_REGEX.is_match(&file.path),
    }
}

/// Plain files, then directories, then ghosts; header order within each.
fn files<'a>(xml: &mut Fragment, files: impl Iterator<Item = &'a PackageFile> + Clone) {
    for kind in [FileKind::File, FileKind::Dir, FileKind::Ghost] {
        for file in files.clone().filter(|file| file.kind == kind) {
            match kind.as_attr() {
                Some(attr) => xml.text("file", &[("type", attr)], &file.path),
                None => xml.text("file", &[], &file.path),
            }
        }
    }
}

fn entries<'a>(xml: &mut Fragment, tag: &str, deps: impl Iterator<Item = &'a Dependency>) {
    let mut deps = deps.peekable();
    if deps.peek().is_none() {
        return;
    }
    xml.open(tag, &[]);
    for dep in deps {
        let mut attrs: Vec<(&str, &str)> = vec![("name", dep.name.as_str())];
        if let Some(flags) = dep.flags {
            attrs.push(("flags", flags.as_str()));
        }
        if let Some(version) = &dep.version {
            attrs.push(("epoch", version.epoch.as_str()));
            attrs.push(("ver", version.version.as_str()));
            if let Some(release) = &version.release {
                attrs.push(("rel", release.as_str()));
            }
        }
        if dep.pre {
            attrs.push(("pre", "1"));
        }
        xml.empty("rpm:entry", &attrs);
    }
    xml.close(tag);
}

/// Strip characters XML 1.0 cannot represent, even escaped.
pub fn xml_clean(text: &str) -> Cow<'_, str> {
    fn legal(c: char) -> bool {
        matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..)
    }
    if text.chars().all(legal) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|c| legal(*c)).collect())
    }
}

/// Minimal string-backed element writer.
struct Fragment {
    out: String,
    pretty: bool,
    depth: usize,
}

impl Fragment {
    fn new(pretty: bool) -> Self {
        Self { out: String::with_capacity(1024), pretty, depth: 0 }
    }

    fn indent(&mut self) {
        if self.pretty {
            if !self.out.is_empty() {
                self.out.push('\n');
            }
            // Fragments sit one level below the document root.
            for _ in 0..=self.depth {
                self.out.push_str("  ");
            }
        }
    }

    fn start(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.indent();
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attrs {
            self.out.push(' ');
            self.out.push_str(name);
            self.out.push_str("=\"");
            self.out.push_str(&escape(xml_clean(value).as_ref()));
            self.out.push('"');
        }
    }

    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.start(tag, attrs);
        self.out.push('>');
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth -= 1;
        self.indent();
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }

    fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.start(tag, attrs);
        self.out.push_str("/>");
    }

    fn text(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) {
        if text.is_empty() {
            return self.empty(tag, attrs);
        }
        self.start(tag, attrs);
        self.out.push('>');
        self.out.push_str(&partial_escape(xml_clean(text).as_ref()));
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }

    fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangelogEntry, DependencyFlags};
    use crate::testing::sample_package;
    use rstest::rstest;

    #[test]
    fn test_primary_compact() {
        let package = sample_package();
        let location = Location::new("Packages/hello-2.12-1.x86_64.rpm", None);
        let xml = package.primary(&location, &RenderOptions::default());
        assert!(xml.starts_with("<package type=\"rpm\"><name>hello</name><arch>x86_64</arch>"));
        assert!(xml.contains("<version epoch=\"0\" ver=\"2.12\" rel=\"1\"/>"));
        assert!(xml.contains(&format!("<checksum type=\"sha256\" pkgid=\"YES\">{}</checksum>", package.identity.pkgid())));
        assert!(xml.contains("<location href=\"Packages/hello-2.12-1.x86_64.rpm\"/>"));
        assert!(xml.contains("<rpm:vendor/>"));
        assert!(xml.ends_with("</format></package>"));
        assert!(!xml.contains('\n'));
    }

    #[test]
    fn test_primary_dependencies() {
        let xml = sample_package().primary(&Location::default(), &RenderOptions::default());
        assert!(xml.contains("<rpm:provides><rpm:entry name=\"hello\" flags=\"EQ\" epoch=\"0\" ver=\"2.12\" rel=\"1\"/></rpm:provides>"));
        assert!(xml.contains("<rpm:entry name=\"/bin/sh\" pre=\"1\"/>"));
        assert!(xml.contains("<rpm:entry name=\"glibc\" flags=\"GE\" epoch=\"0\" ver=\"2.34\"/>"));
        assert!(!xml.contains("rpmlib("));
        assert!(!xml.contains("rpm:conflicts"));
    }

    #[test]
    fn test_primary_keeps_only_interesting_files() {
        let xml = sample_package().primary(&Location::default(), &RenderOptions::default());
        assert!(xml.contains("<file>/usr/bin/hello</file>"));
        assert!(xml.contains("<file>/etc/hello.conf</file>"));
        assert!(!xml.contains("/usr/share/doc/hello/README"));
        assert!(!xml.contains("type=\"dir\">/usr/share/doc/hello"));
    }

    #[test]
    fn test_location_with_base() {
        let location = Location::new("a.rpm", Some("http://mirror.example/os#2".to_string()));
        let xml = sample_package().primary(&location, &RenderOptions::default());
        assert!(xml.contains("<location xml:base=\"http://mirror.example/os#2\" href=\"a.rpm\"/>"));
    }

    #[test]
    fn test_filelists() {
        let package = sample_package();
        let xml = package.filelists(&RenderOptions::default());
        assert_eq!(
            xml,
            format!(
                "<package pkgid=\"{}\" name=\"hello\" arch=\"x86_64\"><version epoch=\"0\" ver=\"2.12\" rel=\"1\"/>\
                 <file>/usr/bin/hello</file><file>/etc/hello.conf</file><file>/usr/share/doc/hello/README</file>\
                 <file type=\"dir\">/usr/share/doc/hello</file><file type=\"ghost\">/var/log/hello.log</file></package>",
                package.identity.pkgid()
            )
        );
    }

    #[rstest]
    #[case(None, 2)]
    #[case(Some(1), 1)]
    #[case(Some(5), 2)]
    fn test_changelog_limit(#[case] limit: Option<usize>, #[case] expected: usize) {
        let options = RenderOptions { changelog_limit: limit, ..RenderOptions::default() };
        let xml = sample_package().other(&options);
        assert_eq!(xml.matches("<changelog ").count(), expected);
        assert!(xml.contains("<changelog author=\"Jane &lt;jane@example.com&gt; - 2.12-1\" date=\"1700000000\">- new upstream</changelog>"));
    }

    #[test]
    fn test_pretty_indents_one_level_below_root() {
        let options = RenderOptions { pretty: true, ..RenderOptions::default() };
        let xml = sample_package().other(&options);
        let lines: Vec<_> = xml.lines().collect();
        assert!(lines[0].starts_with("  <package pkgid="));
        assert!(lines[1].starts_with("    <version "));
        assert_eq!(*lines.last().unwrap(), "  </package>");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let options = RenderOptions { pretty: true, ..RenderOptions::default() };
        let location = Location::new("x.rpm", None);
        assert_eq!(sample_package().primary(&location, &options), sample_package().primary(&location, &options));
    }

    #[test]
    fn test_escaping_and_illegal_characters() {
        let mut package = sample_package();
        package.summary = "a < b & \"c\"\u{1}".to_string();
        package.changelogs = vec![ChangelogEntry { author: "x".into(), date: 0, text: "tab\there".into() }];
        package.provides = vec![Dependency::versioned("q\"uote", DependencyFlags::Lt, "1")];
        let xml = package.primary(&Location::default(), &RenderOptions::default());
        assert!(xml.contains("<summary>a &lt; b &amp; \"c\"</summary>"));
        assert!(xml.contains("name=\"q&quot;uote\""));
        assert!(package.other(&RenderOptions::default()).contains(">tab\there</changelog>"));
    }

    #[test]
    fn test_xml_clean_borrows_clean_text() {
        assert!(matches!(xml_clean("plain"), Cow::Borrowed(_)));
        assert_eq!(xml_clean("a\u{0}b\u{FFFF}c"), "abc");
    }
}
