use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Version comparison of a dependency entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyFlags {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl DependencyFlags {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyFlags::Eq => "EQ",
            DependencyFlags::Lt => "LT",
            DependencyFlags::Gt => "GT",
            DependencyFlags::Le => "LE",
            DependencyFlags::Ge => "GE",
        }
    }
}

impl Display for DependencyFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyFlags {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "EQ" => DependencyFlags::Eq,
            "LT" => DependencyFlags::Lt,
            "GT" => DependencyFlags::Gt,
            "LE" => DependencyFlags::Le,
            "GE" => DependencyFlags::Ge,
            _ => exn::bail!(ErrorKind::MalformedHeader(format!("unknown dependency flags: {s}"))),
        })
    }
}

/// `[epoch:]version[-release]` split into its parts.
///
/// A missing epoch becomes `"0"`; a missing release stays absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryVersion {
    pub epoch: String,
    pub version: String,
    pub release: Option<String>,
}

impl EntryVersion {
    /// Returns `None` for an empty string, which header arrays use for
    /// unversioned entries.
    pub fn parse(evr: &str) -> Option<Self> {
        if evr.is_empty() {
            return None;
        }
        let (epoch, rest) = match evr.split_once(':') {
            Some((epoch, rest)) if !epoch.is_empty() && epoch.bytes().all(|b| b.is_ascii_digit()) => (epoch, rest),
            _ => ("0", evr),
        };
        let (version, release) = match rest.rsplit_once('-') {
            Some((version, release)) => (version, Some(release.to_string())),
            None => (rest, None),
        };
        Some(Self { epoch: epoch.to_string(), version: version.to_string(), release })
    }
}

/// A provides/requires/conflicts/obsoletes entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub flags: Option<DependencyFlags>,
    pub version: Option<EntryVersion>,
    /// Required before the package's install scriptlets run.
    pub pre: bool,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), flags: None, version: None, pre: false }
    }

    pub fn versioned(name: impl Into<String>, flags: DependencyFlags, evr: &str) -> Self {
        Self { flags: Some(flags), version: EntryVersion::parse(evr), ..Self::new(name) }
    }

    /// Requirements on `rpmlib(...)` features are satisfied by rpm itself and
    /// never appear in repository metadata.
    pub fn is_rpmlib(&self) -> bool {
        self.name.starts_with("rpmlib(")
    }
}
