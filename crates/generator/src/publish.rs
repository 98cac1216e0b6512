use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use repodata_config::RunConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// The staging, published and backup directories of one output directory.
#[derive(Debug, Clone)]
pub struct Staging {
    output: PathBuf,
    staging: PathBuf,
    published: PathBuf,
    backup: PathBuf,
}

impl Staging {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            output: config.output_dir(),
            staging: config.staging_dir(),
            published: config.published_dir(),
            backup: config.backup_dir(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.staging
    }

    pub fn published(&self) -> &Path {
        &self.published
    }

    /// Create a fresh staging directory. A leftover one (from a concurrent or
    /// crashed run) is never reused.
    #[instrument(skip(self), fields(staging = %self.staging.display()))]
    pub fn prepare(&self) -> Result<()> {
        if !self.output.is_dir() {
            exn::bail!(ErrorKind::Staging(self.output.clone()));
        }
        if self.backup.exists() {
            tracing::error!(backup = %self.backup.display(), "Backup directory exists; remove it first");
            exn::bail!(ErrorKind::Staging(self.backup.clone()));
        }
        // `create_dir` fails when the directory already exists.
        fs::create_dir(&self.staging).or_raise(|| ErrorKind::Staging(self.staging.clone()))?;
        Ok(())
    }

    /// Swap the staging directory into the published location.
    #[instrument(skip(self), fields(published = %self.published.display()))]
    pub fn publish(&self, keep_backup: bool) -> Result<()> {
        let backed_up = self.published.exists();
        if backed_up {
            fs::rename(&self.published, &self.backup).or_raise(|| ErrorKind::Publish)?;
        }
        if let Err(err) = fs::rename(&self.staging, &self.published) {
            if backed_up && let Err(restore) = fs::rename(&self.backup, &self.published) {
                tracing::error!(
                    backup = %self.backup.display(),
                    error = %restore,
                    "Cannot restore previous metadata"
                );
            }
            return Err(err).or_raise(|| ErrorKind::Publish);
        }
        if backed_up
            && !keep_backup
            && let Err(err) = fs::remove_dir_all(&self.backup)
        {
            tracing::warn!(backup = %self.backup.display(), error = %err, "Cannot remove previous metadata");
        }
        tracing::info!("Published metadata");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging(dir: &Path) -> Staging {
        Staging::new(&RunConfig { directories: vec![dir.to_path_buf()], ..RunConfig::default() })
    }

    #[test]
    fn test_prepare_refuses_leftover_staging() {
        let dir = tempfile::tempdir().unwrap();
        let staging = staging(dir.path());
        staging.prepare().unwrap();
        let err = staging.prepare().unwrap_err();
        assert_eq!(*err, ErrorKind::Staging(dir.path().join(".repodata")));
    }

    #[test]
    fn test_prepare_requires_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = staging(&dir.path().join("missing")).prepare().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Staging(_)));
    }

    #[test]
    fn test_publish_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let staging = staging(dir.path());
        fs::create_dir(dir.path().join("repodata")).unwrap();
        fs::write(dir.path().join("repodata/repomd.xml"), b"old").unwrap();
        staging.prepare().unwrap();
        fs::write(staging.path().join("repomd.xml"), b"new").unwrap();
        staging.publish(false).unwrap();
        assert_eq!(fs::read(dir.path().join("repodata/repomd.xml")).unwrap(), b"new");
        assert!(!dir.path().join(".repodata").exists());
        assert!(!dir.path().join(".olddata").exists());
    }

    #[test]
    fn test_publish_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let staging = staging(dir.path());
        fs::create_dir(dir.path().join("repodata")).unwrap();
        fs::write(dir.path().join("repodata/repomd.xml"), b"old").unwrap();
        staging.prepare().unwrap();
        staging.publish(true).unwrap();
        assert_eq!(fs::read(dir.path().join(".olddata/repomd.xml")).unwrap(), b"old");
    }

    #[test]
    fn test_failed_publish_restores_previous() {
        let dir = tempfile::tempdir().unwrap();
        let staging = staging(dir.path());
        fs::create_dir(dir.path().join("repodata")).unwrap();
        fs::write(dir.path().join("repodata/repomd.xml"), b"old").unwrap();
        // Nothing staged: the second rename fails.
        let err = staging.publish(false).unwrap_err();
        assert_eq!(*err, ErrorKind::Publish);
        assert_eq!(fs::read(dir.path().join("repodata/repomd.xml")).unwrap(), b"old");
        assert!(!dir.path().join(".olddata").exists());
    }
}
