//! The run itself: plan, write documents, build the manifest, publish.

use crate::error::Result;
use crate::fragments::FragmentProducer;
use crate::manifest::{DatabaseExporter, MANIFEST_NAME, ManifestBuilder, RepositoryManifest};
use crate::previous::PreviousRunIndex;
use crate::progress::{Outcome, Progress};
use crate::publish::Staging;
use crate::scan::{DirectoryScanner, PackageFilter, PackageList, PackageSource, href};
use crate::split::{Volume, manifest_base_url};
use crate::writer::{Documents, MetadataWriter};
use repodata_config::RunConfig;
use repodata_package::models::Location;
use repodata_package::{PackageReader, RenderOptions, RpmReader};
use repodata_sqlite::SqliteExporter;
use std::fs;
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::instrument;

/// Opaque repository id recorded by the database exporter.
pub const REPOSITORY_ID: &str = "repodata";

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Packages planned after filtering.
    pub total: usize,
    pub written: usize,
    pub reused: usize,
    pub partial: usize,
    pub extracted: usize,
    /// Packages skipped because of a per-package fault, as planned.
    pub failed: Vec<PathBuf>,
    /// Nothing was written because the published metadata is current.
    pub up_to_date: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: Outcome) {
        self.written += 1;
        match outcome {
            Outcome::Reused => self.reused += 1,
            Outcome::Partial => self.partial += 1,
            Outcome::Extracted => self.extracted += 1,
        }
    }
}

/// A package the run will try to write, in document order.
#[derive(Debug, Clone)]
struct Planned {
    /// Relative to its volume.
    relative: PathBuf,
    path: PathBuf,
    location: Location,
}

/// Generates and publishes the metadata of one repository.
///
/// Every collaborator is injectable; [`MetadataGenerator::new`] wires up the
/// defaults for the configuration (rpm reader, directory scanner or explicit
/// list, SQLite exporter).
pub struct MetadataGenerator<P> {
    config: RunConfig,
    progress: P,
    reader: Box<dyn PackageReader>,
    source: Box<dyn PackageSource>,
    exporter: Box<dyn DatabaseExporter>,
    staging: Staging,
}

impl<P: Progress> MetadataGenerator<P> {
    pub fn new(config: RunConfig, progress: P) -> Self {
        let source: Box<dyn PackageSource> = match config.package_list.is_empty() {
            true => Box::new(DirectoryScanner::new(&config)),
            false => Box::new(PackageList::new(config.package_list.clone())),
        };
        Self {
            reader: Box::new(RpmReader::new(config.checksum)),
            exporter: Box::new(SqliteExporter::new(REPOSITORY_ID)),
            staging: Staging::new(&config),
            source,
            progress,
            config,
        }
    }

    pub fn with_reader(mut self, reader: impl PackageReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    pub fn with_source(mut self, source: impl PackageSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_exporter(mut self, exporter: impl DatabaseExporter + 'static) -> Self {
        self.exporter = Box::new(exporter);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn progress(&self) -> &P {
        &self.progress
    }

    pub fn into_progress(self) -> P {
        self.progress
    }

    pub fn staging(&self) -> &Staging {
        &self.staging
    }

    /// Scan and filter every volume. The length of the plan is the package
    /// count every document is opened with.
    fn plan(&self) -> Result<Vec<Planned>> {
        let filter = PackageFilter::from_config(&self.config)?;
        let mut planned = Vec::new();
        for volume in Volume::all(&self.config) {
            let root = self.config.package_dir(&volume.directory);
            let base_url = volume.base_url(&self.config);
            let found = self.source.scan(&self.config.base_dir, &volume.directory)?;
            let before = planned.len();
            planned.extend(found.into_iter().filter(|relative| filter.allows(relative)).map(|relative| Planned {
                path: root.join(&relative),
                location: Location::new(href(&relative), base_url.clone()),
                relative,
            }));
            tracing::debug!(
                volume = volume.index,
                directory = %root.display(),
                packages = planned.len() - before,
                "Planned volume"
            );
        }
        Ok(planned)
    }

    /// Whether the published metadata is at least as new as every package.
    ///
    /// Always `false` unless timestamp checking is enabled.
    #[instrument(skip(self))]
    pub fn is_up_to_date(&self) -> Result<bool> {
        if !self.config.check_ts {
            return Ok(false);
        }
        let path = self.staging.published().join(MANIFEST_NAME);
        if !path.is_file() {
            return Ok(false);
        }
        let newest = match RepositoryManifest::read(&path) {
            Ok(manifest) => manifest.newest_timestamp(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = ?err, "Cannot read published manifest");
                None
            },
        };
        let Some(newest) = newest else {
            return Ok(false);
        };
        for planned in self.plan()? {
            let modified = fs::metadata(&planned.path).and_then(|meta| meta.modified());
            match modified.map(|time| OffsetDateTime::from(time).unix_timestamp()) {
                Ok(modified) if modified <= newest => {},
                _ => {
                    tracing::debug!(path = %planned.path.display(), "Package changed since last run");
                    return Ok(false);
                },
            }
        }
        Ok(true)
    }

    pub fn prepare(&self) -> Result<()> {
        self.staging.prepare()
    }

    /// Write all three documents into the staging directory.
    ///
    /// Per-package faults are reported and skipped; the documents are closed
    /// in every case.
    #[instrument(skip(self), fields(staging = %self.staging.path().display()))]
    pub fn write_package_metadata(&self) -> Result<(Documents, RunSummary)> {
        let planned = self.plan()?;
        let total = planned.len();
        let mut index = PreviousRunIndex::load(&self.config);
        let mut writer = MetadataWriter::open(self.staging.path(), total)?;
        let mut summary = RunSummary { total, ..RunSummary::default() };
        self.progress.start(total);
        let written = self.write_packages(&planned, &mut index, &mut writer, &mut summary);
        let closed = writer.close();
        self.progress.finish();
        written?;
        let documents = closed?;
        tracing::info!(
            total,
            written = summary.written,
            reused = summary.reused,
            failed = summary.failed.len(),
            "Wrote package metadata"
        );
        Ok((documents, summary))
    }

    fn write_packages(
        &self,
        planned: &[Planned],
        index: &mut PreviousRunIndex,
        writer: &mut MetadataWriter,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let options = RenderOptions { pretty: self.config.pretty, changelog_limit: self.config.changelog_limit };
        let producer = FragmentProducer::new(&*self.reader, options);
        for (offset, package) in planned.iter().enumerate() {
            match producer.produce(&package.path, &package.location, index) {
                Ok((fragments, outcome)) => {
                    writer.write_package(&fragments)?;
                    summary.record(outcome);
                    self.progress.package(offset + 1, planned.len(), &package.relative, outcome);
                },
                Err(err) => {
                    tracing::error!(path = %package.path.display(), error = ?err, "Skipping package");
                    self.progress.failed(&package.path, &err);
                    summary.failed.push(package.path.clone());
                },
            }
        }
        Ok(())
    }

    /// Build `repomd.xml` (and the databases, when enabled) in staging.
    #[instrument(skip_all)]
    pub fn write_repo_manifest(&self, documents: &Documents) -> Result<RepositoryManifest> {
        let builder = ManifestBuilder::new(
            self.staging.path(),
            &self.config.final_dir,
            self.config.checksum,
            manifest_base_url(&self.config),
        );
        let exporter = self.config.database.then_some(&*self.exporter);
        let manifest = builder.build(documents, exporter, self.config.group_file.as_deref())?;
        manifest.write_atomic(self.staging.path())?;
        Ok(manifest)
    }

    pub fn publish(&self) -> Result<()> {
        self.staging.publish(self.config.keep_backup)
    }

    /// Everything, in order. On a fatal error the staging directory is left
    /// in place and nothing is published.
    #[instrument(skip(self))]
    pub fn run(&self) -> Result<RunSummary> {
        if self.is_up_to_date()? {
            tracing::info!("Metadata is up to date");
            return Ok(RunSummary { up_to_date: true, ..RunSummary::default() });
        }
        self.prepare()?;
        let (documents, summary) = self.write_package_metadata()?;
        self.write_repo_manifest(&documents)?;
        self.publish()?;
        if documents.count == 0 {
            tracing::warn!("Published metadata without any packages");
        }
        Ok(summary)
    }
}
