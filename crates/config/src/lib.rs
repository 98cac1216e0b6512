//! Run configuration for the metadata generator.
//!
//! A [`RunConfig`] is assembled once per run from layered sources, validated,
//! and then passed by reference to every component. Nothing mutates it after
//! [`RunConfig::load`] returns; values that vary during a run (such as the
//! per-volume base URL in split-media mode) are derived from it instead.
//!
//! Layering, lowest to highest precedence:
//!
//! 1. [`RunConfig::default`]
//! 2. A configuration file (TOML, YAML or JSON, chosen by extension), either
//!    given explicitly or found at the platform config directory
//!    (`<config_dir>/repodata/config.toml`)
//! 3. `REPODATA_*` environment variables
//! 4. Caller overrides (typically parsed command-line flags)

pub mod error;
mod paths;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
pub use repodata_checksum::ChecksumType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Prefix for environment variable overrides, e.g. `REPODATA_BASE_URL`.
pub const ENV_PREFIX: &str = "REPODATA_";

/// Everything a single generator run needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Algorithm for package ids and every manifest checksum.
    pub checksum: ChecksumType,
    /// Optional `xml:base` for package and manifest locations.
    pub base_url: Option<String>,
    /// Directory the package `directories` are relative to.
    pub base_dir: PathBuf,
    /// Package directories. More than one requires `split`.
    pub directories: Vec<PathBuf>,
    /// Where the metadata directory is created; defaults to the first
    /// package directory.
    pub output_dir: Option<PathBuf>,
    /// Staging directory name, inside the output directory.
    pub temp_dir: PathBuf,
    /// Published directory name, inside the output directory.
    pub final_dir: PathBuf,
    /// Backup directory name for the previously published metadata.
    pub old_dir: PathBuf,
    /// Reuse fragments from a previous run for unchanged packages.
    pub update: bool,
    /// Repository root holding the previous run's `repodata/`; defaults to
    /// the output directory.
    pub update_source: Option<PathBuf>,
    /// Also materialize SQLite databases.
    pub database: bool,
    /// When non-empty, only packages matching one of these globs are used.
    pub includes: Vec<String>,
    /// Packages matching any of these globs are skipped.
    pub excludes: Vec<String>,
    /// Explicit package list (relative to the package directory) used instead
    /// of scanning.
    pub package_list: Vec<PathBuf>,
    pub skip_symlinks: bool,
    /// Indent freshly rendered fragments.
    pub pretty: bool,
    pub quiet: bool,
    pub verbose: bool,
    /// Treat `directories` as the volumes of a split-media set.
    pub split: bool,
    /// External group (comps) file, copied verbatim into the metadata.
    pub group_file: Option<PathBuf>,
    /// Skip the run entirely when no package is newer than the published
    /// metadata.
    pub check_ts: bool,
    /// Only keep the newest N changelog entries per package.
    pub changelog_limit: Option<usize>,
    /// Keep the previously published metadata in `old_dir` after publishing.
    pub keep_backup: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            checksum: ChecksumType::default(),
            base_url: None,
            base_dir: PathBuf::from("."),
            directories: Vec::new(),
            output_dir: None,
            temp_dir: PathBuf::from(".repodata"),
            final_dir: PathBuf::from("repodata"),
            old_dir: PathBuf::from(".olddata"),
            update: false,
            update_source: None,
            database: false,
            includes: Vec::new(),
            excludes: Vec::new(),
            package_list: Vec::new(),
            skip_symlinks: false,
            pretty: false,
            quiet: false,
            verbose: false,
            split: false,
            group_file: None,
            check_ts: false,
            changelog_limit: None,
            keep_backup: false,
        }
    }
}

impl RunConfig {
    /// The platform-specific default configuration file, if the platform has
    /// a notion of one.
    pub fn default_file() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "repodata").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Build the layered [`Figment`] without extracting it.
    ///
    /// An explicitly requested file must exist; the default file is optional.
    pub fn figment(file: Option<&Path>, overrides: impl Serialize) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(RunConfig::default()));
        match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                figment = Self::merge_file(figment, path)?;
            },
            None => {
                if let Some(path) = Self::default_file().filter(|path| path.is_file()) {
                    tracing::debug!(path = %path.display(), "Using default configuration file");
                    figment = Self::merge_file(figment, &path)?;
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)).merge(Serialized::defaults(overrides)))
    }

    fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
        let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnknownFormat(path.to_path_buf())),
        })
    }

    /// Load, merge and validate the configuration for one run.
    #[instrument(skip(overrides))]
    pub fn load(file: Option<&Path>, overrides: impl Serialize) -> Result<Self> {
        let config: RunConfig = Self::figment(file, overrides)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()
    }

    /// Reject combinations the generator cannot honour.
    pub fn validate(self) -> Result<Self> {
        if self.directories.is_empty() {
            exn::bail!(ErrorKind::Invalid("at least one package directory is required".to_string()));
        }
        if self.directories.len() > 1 && !self.split {
            exn::bail!(ErrorKind::Invalid("multiple package directories require split media".to_string()));
        }
        if self.split && !self.package_list.is_empty() {
            exn::bail!(ErrorKind::Invalid("an explicit package list cannot be used with split media".to_string()));
        }
        if self.quiet && self.verbose {
            exn::bail!(ErrorKind::Invalid("quiet and verbose are mutually exclusive".to_string()));
        }
        if self.temp_dir == self.final_dir || self.old_dir == self.final_dir || self.temp_dir == self.old_dir {
            exn::bail!(ErrorKind::Invalid("staging, final and backup directory names must differ".to_string()));
        }
        for pattern in self.includes.iter().chain(&self.excludes) {
            globset::Glob::new(pattern).or_raise(|| ErrorKind::Glob(pattern.clone()))?;
        }
        if let Some(group) = &self.group_file
            && !group.is_file()
        {
            exn::bail!(ErrorKind::NotFound(group.clone()));
        }
        Ok(self)
    }
}
