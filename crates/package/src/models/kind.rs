use crate::consts::{COMMON_NS, FILELISTS_NS, OTHER_NS, RPM_NS, XML_DECLARATION};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The three per-package metadata documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentKind {
    Primary,
    Filelists,
    Other,
}

impl DocumentKind {
    /// Processing order: every package is written to all three, in this order.
    pub const ALL: [DocumentKind; 3] = [DocumentKind::Primary, DocumentKind::Filelists, DocumentKind::Other];

    /// The order in which documents are listed in `repomd.xml`.
    pub const MANIFEST_ORDER: [DocumentKind; 3] = [DocumentKind::Other, DocumentKind::Filelists, DocumentKind::Primary];

    /// The `type` of the document's `<data>` entry.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Primary => "primary",
            DocumentKind::Filelists => "filelists",
            DocumentKind::Other => "other",
        }
    }

    pub fn root_element(&self) -> &'static str {
        match self {
            DocumentKind::Primary => "metadata",
            DocumentKind::Filelists => "filelists",
            DocumentKind::Other => "otherdata",
        }
    }

    /// `primary.xml` and so on, before any compression suffix.
    pub fn file_name(&self) -> String {
        format!("{}.xml", self.as_str())
    }

    /// Everything before the first fragment, declaring `count` packages.
    pub fn preamble(&self, count: usize) -> String {
        let namespaces = match self {
            DocumentKind::Primary => format!(r#"xmlns="{COMMON_NS}" xmlns:rpm="{RPM_NS}""#),
            DocumentKind::Filelists => format!(r#"xmlns="{FILELISTS_NS}""#),
            DocumentKind::Other => format!(r#"xmlns="{OTHER_NS}""#),
        };
        format!("{XML_DECLARATION}\n<{} {namespaces} packages=\"{count}\">\n", self.root_element())
    }

    /// Everything after the last fragment.
    pub fn closing(&self) -> String {
        format!("</{}>\n", self.root_element())
    }
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
