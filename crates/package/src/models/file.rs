/// How a path is listed in the `<file>` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    File,
    Dir,
    /// Owned by the package but not shipped in its payload.
    Ghost,
}

impl FileKind {
    /// Value of the `type` attribute; plain files carry none.
    pub fn as_attr(&self) -> Option<&'static str> {
        match self {
            FileKind::File => None,
            FileKind::Dir => Some("dir"),
            FileKind::Ghost => Some("ghost"),
        }
    }

    pub fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some("dir") => FileKind::Dir,
            Some("ghost") => FileKind::Ghost,
            _ => FileKind::File,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    pub path: String,
    pub kind: FileKind,
}

impl PackageFile {
    pub fn new(path: impl Into<String>, kind: FileKind) -> Self {
        Self { path: path.into(), kind }
    }
}
