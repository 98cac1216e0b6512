//! Paths derived from a [`RunConfig`].

use crate::RunConfig;
use std::path::{Path, PathBuf};

impl RunConfig {
    /// Absolute-or-cwd-relative location of a package directory (or volume).
    pub fn package_dir(&self, directory: impl AsRef<Path>) -> PathBuf {
        self.base_dir.join(directory)
    }

    /// Directory that receives the staging, published and backup directories.
    pub fn output_dir(&self) -> PathBuf {
        match (&self.output_dir, self.directories.first()) {
            (Some(output), _) => output.clone(),
            (None, Some(first)) => self.package_dir(first),
            (None, None) => self.base_dir.clone(),
        }
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.output_dir().join(&self.temp_dir)
    }

    pub fn published_dir(&self) -> PathBuf {
        self.output_dir().join(&self.final_dir)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.output_dir().join(&self.old_dir)
    }

    /// Repository root whose published metadata seeds fragment reuse.
    pub fn previous_root(&self) -> PathBuf {
        self.update_source.clone().unwrap_or_else(|| self.output_dir())
    }

    /// Directory names the scanner must never descend into.
    pub fn reserved_names(&self) -> [&Path; 3] {
        [self.temp_dir.as_path(), self.final_dir.as_path(), self.old_dir.as_path()]
    }
}
