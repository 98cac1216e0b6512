mod changelog;
mod dependency;
mod file;
mod identity;
mod kind;
mod package;

pub use self::changelog::ChangelogEntry;
pub use self::dependency::{Dependency, DependencyFlags, EntryVersion};
pub use self::file::{FileKind, PackageFile};
pub use self::identity::PackageIdentity;
pub use self::kind::DocumentKind;
pub use self::package::{HeaderRange, Location, Package};
