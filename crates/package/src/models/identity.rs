use repodata_checksum::Checksum;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};

/// What makes two package archives "the same package" for fragment reuse.
///
/// Name, version, release and architecture say which build it claims to be;
/// the archive checksum says the bytes have not changed. The filesystem path
/// plays no part, so a package that merely moved is still recognised.
///
/// The epoch is carried for rendering but does not take part in equality:
/// it lives inside the header, which the checksum already covers.
#[derive(Debug, Clone)]
pub struct PackageIdentity {
    pub name: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub checksum: Checksum,
}

impl PackageIdentity {
    fn key(&self) -> (&str, &str, &str, &str, &Checksum) {
        (&self.name, &self.version, &self.release, &self.arch, &self.checksum)
    }

    /// Hex digest of the archive, as written in `pkgid` attributes.
    pub fn pkgid(&self) -> &str {
        self.checksum.value()
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Display for PackageIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}-{}-{}.{}", self.name, self.version, self.release, self.arch)
    }
}
