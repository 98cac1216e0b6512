use crate::db::Database;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use repodata_checksum::Checksum;
use repodata_package::models::{Dependency, DocumentKind, FileKind, PackageFile};
use repodata_package::{DocumentReader, ParsedPackage};
use sqlx::SqliteConnection;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Schema version written to `db_info` and advertised in `repomd.xml`.
pub const DB_VERSION: u32 = 10;

/// Materializes the XML metadata documents as SQLite databases.
///
/// The public interface is synchronous; each export drives `sqlx` on its own
/// current-thread runtime.
#[derive(Debug, Clone)]
pub struct SqliteExporter {
    repo_id: String,
}

impl SqliteExporter {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self { repo_id: repo_id.into() }
    }

    pub fn version(&self) -> u32 {
        DB_VERSION
    }

    /// The name `export` writes to inside the staging directory.
    pub fn output_name(kind: DocumentKind) -> String {
        format!("{}.gz.sqlite", kind.file_name())
    }

    /// Build the database for `<staging>/<kind>.xml.gz`, recording
    /// `checksum` (of the compressed document) in `db_info`.
    ///
    /// Returns the path of the new database.
    #[instrument(skip(self, staging, checksum), fields(repo = %self.repo_id, staging = %staging.display()))]
    pub fn export(&self, staging: &Path, kind: DocumentKind, checksum: &Checksum) -> Result<PathBuf> {
        let document = staging.join(format!("{}.gz", kind.file_name()));
        let output = staging.join(Self::output_name(kind));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .or_raise(|| ErrorKind::Runtime)?;
        let count = runtime.block_on(populate(&document, &output, kind, checksum))?;
        tracing::info!(path = %output.display(), count, "Wrote {kind} database");
        Ok(output)
    }
}

async fn populate(document: &Path, output: &Path, kind: DocumentKind, checksum: &Checksum) -> Result<usize> {
    let source = repodata_compress::open(document).or_raise(|| ErrorKind::Document(document.to_path_buf()))?;
    let mut packages = DocumentReader::new(BufReader::new(source));
    let db = Database::create(output, kind).await?;
    let mut tx = db.pool().begin().await.or_raise(|| ErrorKind::Database)?;
    let mut count = 0;
    while let Some((_, package)) = packages.next_package().or_raise(|| ErrorKind::Document(document.to_path_buf()))? {
        let key = insert_package(&mut tx, &package, kind).await?;
        match kind {
            DocumentKind::Primary => insert_primary_details(&mut tx, &package, key).await?,
            DocumentKind::Filelists => insert_filelist(&mut tx, &package.files, key).await?,
            DocumentKind::Other => insert_changelog(&mut tx, &package, key).await?,
        }
        count += 1;
    }
    sqlx::query("INSERT INTO db_info (dbversion, checksum) VALUES (?, ?)")
        .bind(i64::from(DB_VERSION))
        .bind(checksum.value())
        .execute(&mut *tx)
        .await
        .or_raise(|| ErrorKind::Database)?;
    tx.commit().await.or_raise(|| ErrorKind::Database)?;
    db.close().await;
    Ok(count)
}

/// Insert the `packages` row and return its `pkgKey`.
async fn insert_package(conn: &mut SqliteConnection, package: &ParsedPackage, kind: DocumentKind) -> Result<i64> {
    let result = match kind {
        DocumentKind::Filelists | DocumentKind::Other => {
            sqlx::query("INSERT INTO packages (pkgId) VALUES (?)").bind(&package.pkgid).execute(&mut *conn).await
        },
        DocumentKind::Primary => {
            sqlx::query(
                r#"
                    INSERT INTO packages (
                        pkgId, name, arch, version, epoch, release, summary, description, url,
                        time_file, time_build, rpm_license, rpm_vendor, rpm_group, rpm_buildhost,
                        rpm_sourcerpm, rpm_header_start, rpm_header_end, rpm_packager,
                        size_package, size_installed, size_archive, location_href, location_base,
                        checksum_type
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&package.pkgid)
            .bind(&package.name)
            .bind(&package.arch)
            .bind(&package.version)
            .bind(&package.epoch)
            .bind(&package.release)
            .bind(&package.summary)
            .bind(&package.description)
            .bind(&package.url)
            .bind(package.file_time as i64)
            .bind(package.build_time as i64)
            .bind(&package.license)
            .bind(&package.vendor)
            .bind(&package.group)
            .bind(&package.build_host)
            .bind(&package.source_rpm)
            .bind(package.header_start as i64)
            .bind(package.header_end as i64)
            .bind(&package.packager)
            .bind(package.package_size as i64)
            .bind(package.installed_size as i64)
            .bind(package.archive_size as i64)
            .bind(&package.location.href)
            .bind(&package.location.base)
            .bind(&package.checksum_type)
            .execute(&mut *conn)
            .await
        },
    };
    Ok(result.or_raise(|| ErrorKind::Database)?.last_insert_rowid())
}

async fn insert_primary_details(conn: &mut SqliteConnection, package: &ParsedPackage, key: i64) -> Result<()> {
    for file in &package.files {
        sqlx::query("INSERT INTO files (name, type, pkgKey) VALUES (?, ?, ?)")
            .bind(&file.path)
            .bind(file.kind.as_attr().unwrap_or("file"))
            .bind(key)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
    }
    insert_dependencies(conn, "provides", &package.provides, key).await?;
    insert_dependencies(conn, "requires", &package.requires, key).await?;
    insert_dependencies(conn, "conflicts", &package.conflicts, key).await?;
    insert_dependencies(conn, "obsoletes", &package.obsoletes, key).await
}

async fn insert_dependencies(conn: &mut SqliteConnection, table: &str, entries: &[Dependency], key: i64) -> Result<()> {
    let sql = match table {
        "requires" => format!(
            "INSERT INTO {table} (name, flags, epoch, version, release, pkgKey, pre) VALUES (?, ?, ?, ?, ?, ?, ?)"
        ),
        _ => format!("INSERT INTO {table} (name, flags, epoch, version, release, pkgKey) VALUES (?, ?, ?, ?, ?, ?)"),
    };
    for entry in entries {
        let version = entry.version.as_ref();
        let mut query = sqlx::query(&sql)
            .bind(&entry.name)
            .bind(entry.flags.map(|flags| flags.as_str()))
            .bind(version.map(|v| v.epoch.as_str()))
            .bind(version.map(|v| v.version.as_str()))
            .bind(version.and_then(|v| v.release.as_deref()))
            .bind(key);
        if table == "requires" {
            query = query.bind(entry.pre);
        }
        query.execute(&mut *conn).await.or_raise(|| ErrorKind::Database)?;
    }
    Ok(())
}

/// Group paths by directory the way the filelists database stores them:
/// one row per directory, names joined with `/`, one type letter per name.
fn group_by_directory(files: &[PackageFile]) -> Vec<(String, String, String)> {
    let mut rows: Vec<(String, String, String)> = Vec::new();
    for file in files {
        let (dirname, basename) = match file.path.rfind('/') {
            Some(0) => ("/", &file.path[1..]),
            Some(index) => (&file.path[..index], &file.path[index + 1..]),
            None => ("", file.path.as_str()),
        };
        let kind = match file.kind {
            FileKind::File => 'f',
            FileKind::Dir => 'd',
            FileKind::Ghost => 'g',
        };
        match rows.iter_mut().find(|(dir, _, _)| dir == dirname) {
            Some((_, names, types)) => {
                names.push('/');
                names.push_str(basename);
                types.push(kind);
            },
            None => rows.push((dirname.to_string(), basename.to_string(), kind.to_string())),
        }
    }
    rows
}

async fn insert_filelist(conn: &mut SqliteConnection, files: &[PackageFile], key: i64) -> Result<()> {
    for (dirname, filenames, filetypes) in group_by_directory(files) {
        sqlx::query("INSERT INTO filelist (pkgKey, dirname, filenames, filetypes) VALUES (?, ?, ?, ?)")
            .bind(key)
            .bind(dirname)
            .bind(filenames)
            .bind(filetypes)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
    }
    Ok(())
}

async fn insert_changelog(conn: &mut SqliteConnection, package: &ParsedPackage, key: i64) -> Result<()> {
    for entry in &package.changelogs {
        sqlx::query("INSERT INTO changelog (pkgKey, author, date, changelog) VALUES (?, ?, ?, ?)")
            .bind(key)
            .bind(&entry.author)
            .bind(entry.date as i64)
            .bind(&entry.text)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
    }
    Ok(())
}
