//! Connection handling for freshly created metadata databases.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use repodata_package::models::DocumentKind;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

/// A single-writer database that is built once and then shipped.
#[derive(Debug, Clone)]
pub(crate) struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database at `path` with the schema for `kind`.
    ///
    /// Any existing file at `path` is replaced.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub(crate) async fn create(path: &Path, kind: DocumentKind) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path).or_raise(|| ErrorKind::Database)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            // The file is compressed and published as soon as it is written;
            // there is nobody to recover a journal for.
            .journal_mode(SqliteJournalMode::Off)
            .synchronous(SqliteSynchronous::Off);
        // One connection: everything happens in a single transaction anyway.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::raw_sql(Self::schema(kind)).execute(&pool).await.or_raise(|| ErrorKind::Database)?;
        Ok(Self { pool })
    }

    fn schema(kind: DocumentKind) -> &'static str {
        match kind {
            DocumentKind::Primary => include_str!("../schema/primary.sql"),
            DocumentKind::Filelists => include_str!("../schema/filelists.sql"),
            DocumentKind::Other => include_str!("../schema/other.sql"),
        }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
