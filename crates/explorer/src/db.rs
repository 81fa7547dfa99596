//! Database connection management.

use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Tables (a subset of the firmware's schema) created for in-memory databases.
const SCHEMA: &str = include_str!("../queries/schema.sql");
/// Used for in-memory databases, where nothing else can hold a lock.
const IN_MEMORY_BUSY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Handle to the device-wide library database.
///
/// The database belongs to the device firmware: it is never created, migrated
/// or vacuumed from here. A single connection is opened once and held for the
/// lifetime of the process; every component shares it through clones of this
/// handle.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // One long-lived handle. Never reopened between calls, and never
            // more than one writer competing with the firmware.
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Connect)?;
        Ok(Self { pool })
    }

    /// Open the existing database at `path`.
    ///
    /// Statements wait at most `busy_timeout` for locks held by other
    /// processes before failing with [`ErrorKind::Busy`].
    #[instrument("opening device database", skip(path), fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let options = Self::base_options(busy_timeout).filename(path.as_ref()).create_if_missing(false);
        Self::new(options).await
    }

    /// Connect to an in-memory database containing empty device tables.
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options(IN_MEMORY_BUSY_TIMEOUT).filename(":memory:");
        let db = Self::new(options).await?;
        sqlx::raw_sql(SCHEMA).execute(&db.pool).await.map_err(ErrorKind::database)?;
        Ok(db)
    }

    fn base_options(busy_timeout: Duration) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // Behave like the firmware's own connections: plain SQLite
            // defaults, the journal mode left exactly as the device set it.
            .foreign_keys(false)
            .busy_timeout(busy_timeout)
    }

    /// Get a reference to the underlying connection pool.
    ///
    /// This is useful for running custom queries or transactions.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection. After calling this, the Database instance
    /// should not be used.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert_eq!(tables, ["books_settings", "bookshelfs", "bookshelfs_books", "files", "folders", "profiles"]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_busy_timeout_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explorer-3.db");
        std::fs::File::create(&path).unwrap();
        let db = Database::connect(&path, Duration::from_millis(1234)).await.unwrap();
        let row: (i64,) = sqlx::query_as("PRAGMA busy_timeout").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 1234);
        db.close().await;
    }

    #[tokio::test]
    async fn test_missing_database_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let err = Database::connect(&path, Duration::from_millis(100)).await.unwrap_err();
        assert_eq!(err.deref(), &ErrorKind::Connect);
        assert!(!path.exists());
    }
}
