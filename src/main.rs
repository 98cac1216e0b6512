//! `repodata`: generate repository metadata for a directory of packages.

use clap::Parser;
use derive_more::{Display, Error};
use exn::ResultExt;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use repodata_config::RunConfig;
use repodata_generator::{MetadataGenerator, Outcome, Progress, RunSummary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

type Error = exn::Exn<ErrorKind>;
type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("cannot read package list: {}", _0.display())]
    PackageList(#[error(not(source))] PathBuf),
    #[display("metadata generation failed")]
    Generate,
}

fn skip(flag: &bool) -> bool {
    !*flag
}

/// Command-line flags. Everything set here overrides the configuration file
/// and the environment; unset flags are left out of the overrides entirely.
#[derive(Debug, Parser, Serialize)]
#[command(name = "repodata", version, about)]
struct Cli {
    /// Package directories; more than one requires --split.
    #[arg(required = true)]
    directories: Vec<PathBuf>,
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long)]
    #[serde(skip)]
    config: Option<PathBuf>,
    /// Checksum algorithm: sha, sha1, sha256, sha384 or sha512.
    #[arg(short = 's', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    /// Optional base URL for package and metadata locations.
    #[arg(short = 'u', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    /// Directory the package directories are relative to.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    base_dir: Option<PathBuf>,
    /// Where to put the metadata directory.
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    temp_dir: Option<PathBuf>,
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    final_dir: Option<PathBuf>,
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    old_dir: Option<PathBuf>,
    /// Reuse metadata of unchanged packages from the previous run.
    #[arg(long)]
    #[serde(skip_serializing_if = "skip")]
    update: bool,
    /// Repository whose metadata --update reuses.
    #[arg(long, value_name = "DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    update_source: Option<PathBuf>,
    /// Also generate SQLite databases.
    #[arg(short, long)]
    #[serde(skip_serializing_if = "skip")]
    database: bool,
    /// Only use packages matching this glob (repeatable).
    #[arg(long = "include", value_name = "GLOB")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    includes: Vec<String>,
    /// Skip packages matching this glob (repeatable).
    #[arg(short = 'x', long = "exclude", value_name = "GLOB")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    excludes: Vec<String>,
    /// File listing the packages to use, one relative path per line.
    #[arg(short = 'i', long = "pkglist", value_name = "FILE")]
    #[serde(skip)]
    package_list_file: Option<PathBuf>,
    #[arg(skip)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    package_list: Vec<PathBuf>,
    /// Ignore symlinked packages.
    #[arg(short = 'S', long)]
    #[serde(skip_serializing_if = "skip")]
    skip_symlinks: bool,
    /// Indent the generated documents.
    #[arg(short, long)]
    #[serde(skip_serializing_if = "skip")]
    pretty: bool,
    #[arg(short, long, conflicts_with = "verbose")]
    #[serde(skip_serializing_if = "skip")]
    quiet: bool,
    #[arg(short, long)]
    #[serde(skip_serializing_if = "skip")]
    verbose: bool,
    /// Treat the directories as the volumes of a split media set.
    #[arg(long)]
    #[serde(skip_serializing_if = "skip")]
    split: bool,
    /// Group (comps) file to include.
    #[arg(short, long = "groupfile", value_name = "FILE")]
    #[serde(skip_serializing_if = "Option::is_none")]
    group_file: Option<PathBuf>,
    /// Do nothing when no package is newer than the published metadata.
    #[arg(short = 'C', long = "checkts")]
    #[serde(skip_serializing_if = "skip")]
    check_ts: bool,
    /// Only keep the newest N changelog entries.
    #[arg(long, value_name = "N")]
    #[serde(skip_serializing_if = "Option::is_none")]
    changelog_limit: Option<usize>,
    /// Keep the previous metadata in the backup directory.
    #[arg(long)]
    #[serde(skip_serializing_if = "skip")]
    keep_backup: bool,
}

impl Cli {
    fn config(mut self) -> Result<RunConfig> {
        if let Some(list) = self.package_list_file.take() {
            let contents = std::fs::read_to_string(&list).or_raise(|| ErrorKind::PackageList(list.clone()))?;
            self.package_list =
                contents.lines().map(str::trim).filter(|line| !line.is_empty()).map(PathBuf::from).collect();
        }
        let file = self.config.clone();
        RunConfig::load(file.as_deref(), &self).or_raise(|| ErrorKind::Config)
    }
}

fn init_logging(config: &RunConfig) {
    let level = match (config.quiet, config.verbose) {
        (true, _) => "error",
        (_, true) => "debug",
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

/// Terminal progress: a single counter line, or one line per package when
/// verbose. Failures are printed as they happen.
struct TerminalProgress {
    bar: ProgressBar,
    verbose: bool,
}

impl TerminalProgress {
    fn new(config: &RunConfig) -> Self {
        let bar = match config.quiet {
            true => ProgressBar::hidden(),
            false => ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout()),
        };
        if let Ok(style) = ProgressStyle::with_template("{msg}") {
            bar.set_style(style);
        }
        Self { bar, verbose: config.verbose }
    }
}

impl Progress for TerminalProgress {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn package(&self, current: usize, total: usize, path: &Path, outcome: Outcome) {
        let mark = match outcome {
            Outcome::Reused => '*',
            Outcome::Partial | Outcome::Extracted => '-',
        };
        let line = format!("{current}/{total} [{mark}] {}", path.display());
        self.bar.set_position(current as u64);
        match self.verbose {
            true => self.bar.println(line),
            false => self.bar.set_message(line),
        }
    }

    fn failed(&self, path: &Path, error: &repodata_generator::error::Error) {
        self.bar.println(format!("Failed to read {}: {error:?}", path.display()));
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn report(config: &RunConfig, summary: &RunSummary) {
    if config.quiet {
        return;
    }
    if summary.up_to_date {
        println!("Metadata is up to date");
        return;
    }
    println!(
        "Wrote metadata for {} of {} packages ({} reused) to {}",
        summary.written,
        summary.total,
        summary.reused,
        config.published_dir().display()
    );
    if !summary.failed.is_empty() {
        println!("{} packages could not be read", summary.failed.len());
    }
}

fn run(config: RunConfig) -> Result<RunSummary> {
    let progress = TerminalProgress::new(&config);
    let generator = MetadataGenerator::new(config, progress);
    generator.run().or_raise(|| ErrorKind::Generate).inspect_err(|_| {
        let staging = generator.staging().path();
        if staging.is_dir() {
            tracing::error!(staging = %staging.display(), "Staging directory left in place");
        }
    })
}

fn main() -> ExitCode {
    let config = match Cli::parse().config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:?}");
            return ExitCode::FAILURE;
        },
    };
    init_logging(&config);
    match run(config.clone()) {
        Ok(summary) => {
            report(&config, &summary);
            ExitCode::SUCCESS
        },
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        },
    }
}
