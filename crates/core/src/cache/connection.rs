//! Database connection management with pragma configuration.
//!
//! Opens the SQLite file, applies WAL pragmas, runs migrations, and carries
//! the TTL that page reads enforce.

use super::migrations;
use super::pages::DEFAULT_TTL_MS;
use crate::Error;
use chrono::Duration;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;";

/// Cache database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations on a
/// background thread. Cloning is cheap and every clone talks to the same
/// connection, so the pipeline hands one clone to each acquisition task.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
    pub(crate) ttl: Duration,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file (and its parent directory) if needed, applies
    /// pragmas, and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::CacheDir { path: parent.to_path_buf(), source })?;
        }

        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        tracing::debug!(path = %path.display(), "opened page cache");
        Self::init(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn, ttl: Duration::milliseconds(DEFAULT_TTL_MS) })
    }

    /// Replace the entry TTL (default one hour).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The TTL enforced on reads.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let version = db
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
        assert_eq!(db.ttl(), Duration::hours(1));
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");

        let db = CacheDb::open(&path).await.unwrap();
        assert!(path.exists());
        drop(db);
    }

    #[tokio::test]
    async fn test_open_reports_uncreatable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = CacheDb::open(blocker.join("cache.db")).await.unwrap_err();
        assert!(matches!(err, Error::CacheDir { ref path, .. } if path == &blocker));
        assert!(err.to_string().starts_with("CACHE_ERROR: cannot create"));
    }

    #[tokio::test]
    async fn test_with_ttl() {
        let db = CacheDb::open_in_memory().await.unwrap().with_ttl(Duration::seconds(5));
        assert_eq!(db.ttl(), Duration::seconds(5));
    }
}
