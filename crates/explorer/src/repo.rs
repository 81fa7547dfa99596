//! SQLite implementation of [`LibraryStore`].
//!
//! Every statement lives in `queries/` and every value is bound; nothing is
//! ever formatted into SQL text.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Collection, Progress, ProgressRow};
use crate::store::LibraryStore;
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool};
use tracing::instrument;

type Statement<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Repository over the firmware's `folders`, `files`, `profiles`,
/// `books_settings`, `bookshelfs` and `bookshelfs_books` tables.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stored position for `(book_id, profile_id)`, if any.
    pub async fn progress(&self, book_id: i64, profile_id: i64) -> Result<Option<Progress>> {
        let row: Option<ProgressRow> = sqlx::query_as(include_str!("../queries/get_progress.sql"))
            .bind(book_id)
            .bind(profile_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ErrorKind::database)?;
        row.map(Progress::try_from).transpose()
    }

    /// Run a single statement between BEGIN and COMMIT.
    ///
    /// If the statement fails the transaction is rolled back explicitly; a
    /// failing rollback is only logged, the statement's error is what gets
    /// returned. A failed COMMIT consumes the transaction; SQLite rolls it
    /// back before the connection is handed out again.
    async fn execute_in_transaction(&self, operation: &'static str, statement: Statement<'_>) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(ErrorKind::database)?;
        match statement.execute(&mut *tx).await {
            Ok(done) => match tx.commit().await {
                Ok(()) => Ok(done.rows_affected()),
                Err(err) => {
                    tracing::warn!(operation, error = %err, "Commit failed; rolling back");
                    Err(ErrorKind::database(err))
                },
            },
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(operation, error = %rollback, "Rollback failed after statement error");
                }
                Err(ErrorKind::database(err))
            },
        }
    }
}

#[async_trait]
impl LibraryStore for Repository {
    async fn folder_id(&self, name: &str) -> Result<Option<i64>> {
        sqlx::query_scalar(include_str!("../queries/get_folder_id.sql"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(ErrorKind::database)
    }

    async fn book_id(&self, folder_id: i64, filename: &str) -> Result<Option<i64>> {
        sqlx::query_scalar(include_str!("../queries/get_book_id.sql"))
            .bind(folder_id)
            .bind(filename)
            .fetch_optional(&self.pool)
            .await
            .map_err(ErrorKind::database)
    }

    async fn profile_id(&self, name: &str) -> Result<Option<i64>> {
        sqlx::query_scalar(include_str!("../queries/get_profile_id.sql"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(ErrorKind::database)
    }

    #[instrument(skip(self, progress), fields(book_id = progress.book_id, profile_id = progress.profile_id, page = progress.page))]
    async fn write_progress(&self, progress: &Progress) -> Result<()> {
        let row = ProgressRow::from(progress);
        let statement = sqlx::query(include_str!("../queries/replace_progress.sql"))
            .bind(row.bookid)
            .bind(row.profileid)
            .bind(row.cpage)
            .bind(row.npage)
            .bind(row.completed)
            .bind(row.opentime);
        self.execute_in_transaction("write progress", statement).await?;
        Ok(())
    }

    async fn collection(&self, id: i64) -> Result<Option<Collection>> {
        sqlx::query_as(include_str!("../queries/get_collection.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ErrorKind::database)
    }

    async fn collections(&self) -> Result<Vec<Collection>> {
        sqlx::query_as(include_str!("../queries/list_collections.sql"))
            .fetch_all(&self.pool)
            .await
            .map_err(ErrorKind::database)
    }

    async fn is_in_collection(&self, book_id: i64, collection_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/get_membership.sql"))
            .bind(book_id)
            .bind(collection_id)
            .fetch_one(&self.pool)
            .await
            .map_err(ErrorKind::database)?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn remove_from_collection(&self, book_id: i64, collection_id: i64) -> Result<()> {
        let statement =
            sqlx::query(include_str!("../queries/delete_membership.sql")).bind(book_id).bind(collection_id);
        let removed = self.execute_in_transaction("remove from collection", statement).await?;
        tracing::debug!(removed, "Collection membership removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Connection;
    use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
    use std::ops::Deref;
    use std::time::Duration;
    use time::UtcDateTime;

    const FIXTURE: &str = r#"
        INSERT INTO folders (id, name) VALUES (1, '/mnt/ext1/Books'), (2, '/mnt/ext1/Books/O''Brien');
        INSERT INTO files (folder_id, filename, book_id) VALUES (1, 'novel.epub', 10), (2, 'novel.epub', 20);
        INSERT INTO profiles (id, name) VALUES (1, 'default'), (4, 'Alice');
        INSERT INTO bookshelfs (id, name, is_deleted) VALUES (7, 'To Read', 0), (8, 'archive', 0), (9, 'Gone', 1);
        INSERT INTO bookshelfs_books (bookshelfid, bookid) VALUES (7, 10), (8, 10);
    "#;

    async fn repository() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        sqlx::raw_sql(FIXTURE).execute(db.pool()).await.unwrap();
        Repository::from(&db)
    }

    fn progress(book_id: i64, page: u32, completed: bool) -> Progress {
        Progress {
            book_id,
            profile_id: 1,
            page,
            total_pages: 42,
            completed,
            opened_at: UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_identifier_lookups() {
        let repo = repository().await;
        assert_eq!(repo.folder_id("/mnt/ext1/Books").await.unwrap(), Some(1));
        assert_eq!(repo.folder_id("/mnt/ext1/Books/").await.unwrap(), None);
        assert_eq!(repo.book_id(1, "novel.epub").await.unwrap(), Some(10));
        assert_eq!(repo.book_id(1, "other.epub").await.unwrap(), None);
        assert_eq!(repo.profile_id("Alice").await.unwrap(), Some(4));
        assert_eq!(repo.profile_id("Bob").await.unwrap(), None);
    }

    #[rstest::rstest]
    #[case("/mnt/ext1/Books", "novel.epub", Some(10))]
    #[case("/mnt/ext1/Books", "NOVEL.EPUB", None)]
    #[case("/mnt/ext1/Books/O'Brien", "novel.epub", Some(20))]
    #[case("/mnt/ext1", "Books/novel.epub", None)]
    #[tokio::test]
    async fn test_resolve_book(#[case] folder: &str, #[case] file: &str, #[case] expected: Option<i64>) {
        let repo = repository().await;
        let book = match repo.folder_id(folder).await.unwrap() {
            Some(folder_id) => repo.book_id(folder_id, file).await.unwrap(),
            None => None,
        };
        assert_eq!(book, expected);
    }

    #[tokio::test]
    async fn test_values_are_bound_not_interpolated() {
        let repo = repository().await;
        let folder = repo.folder_id("/mnt/ext1/Books/O'Brien").await.unwrap().unwrap();
        assert_eq!(repo.book_id(folder, "novel.epub").await.unwrap(), Some(20));
        assert_eq!(repo.folder_id("' OR '1'='1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_progress_replaces_row() {
        let repo = repository().await;
        repo.write_progress(&progress(10, 5, false)).await.unwrap();
        repo.write_progress(&progress(10, 42, true)).await.unwrap();
        let stored = repo.progress(10, 1).await.unwrap().unwrap();
        assert_eq!(stored.page, 42);
        assert!(stored.completed);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books_settings").fetch_one(&repo.pool).await.unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_write_progress_does_not_merge() {
        let repo = repository().await;
        sqlx::query("INSERT INTO books_settings (bookid, profileid, cpage, npage, completed, opentime) VALUES (10, 1, 3, 99, 1, 5)")
            .execute(&repo.pool)
            .await
            .unwrap();
        repo.write_progress(&progress(10, 7, false)).await.unwrap();
        let stored = repo.progress(10, 1).await.unwrap().unwrap();
        assert_eq!((stored.page, stored.total_pages, stored.completed), (7, 42, false));
    }

    #[tokio::test]
    async fn test_collections() {
        let repo = repository().await;
        let names: Vec<String> = repo.collections().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["archive", "To Read"]);
        assert_eq!(repo.collection(7).await.unwrap().map(|c| c.name).as_deref(), Some("To Read"));
        assert_eq!(repo.collection(9).await.unwrap(), None);
        assert_eq!(repo.collection(404).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_from_collection_is_idempotent() {
        let repo = repository().await;
        assert!(repo.is_in_collection(10, 7).await.unwrap());
        repo.remove_from_collection(10, 7).await.unwrap();
        assert!(!repo.is_in_collection(10, 7).await.unwrap());
        // Membership in other collections is untouched.
        assert!(repo.is_in_collection(10, 8).await.unwrap());
        repo.remove_from_collection(10, 7).await.unwrap();
        assert!(!repo.is_in_collection(10, 7).await.unwrap());
    }

    #[tokio::test]
    async fn test_locked_database_fails_with_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explorer-3.db");
        let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
        let mut firmware = SqliteConnection::connect_with(&options).await.unwrap();
        sqlx::raw_sql(include_str!("../queries/schema.sql")).execute(&mut firmware).await.unwrap();

        let db = Database::connect(&path, Duration::from_millis(50)).await.unwrap();
        let repo = Repository::from(&db);

        // The firmware grabs the write lock and holds on to it.
        sqlx::query("BEGIN IMMEDIATE").execute(&mut firmware).await.unwrap();
        let err = repo.write_progress(&progress(10, 5, false)).await.unwrap_err();
        assert_eq!(err.deref(), &ErrorKind::Busy);
        assert!(err.is_retryable());

        // Once the lock is released the same handle works again, so the
        // failed transaction was not left open.
        sqlx::query("COMMIT").execute(&mut firmware).await.unwrap();
        repo.write_progress(&progress(10, 6, false)).await.unwrap();
        assert_eq!(repo.progress(10, 1).await.unwrap().unwrap().page, 6);
        db.close().await;
    }

    #[tokio::test]
    async fn test_failed_commit_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explorer-3.db");
        let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
        let mut firmware = SqliteConnection::connect_with(&options).await.unwrap();
        sqlx::raw_sql(include_str!("../queries/schema.sql")).execute(&mut firmware).await.unwrap();

        let db = Database::connect(&path, Duration::from_millis(50)).await.unwrap();
        let repo = Repository::from(&db);

        // A reader mid-transaction keeps its shared lock: the upsert itself
        // succeeds, but COMMIT cannot get the exclusive lock in time.
        sqlx::query("BEGIN").execute(&mut firmware).await.unwrap();
        sqlx::query("SELECT COUNT(*) FROM books_settings").fetch_one(&mut firmware).await.unwrap();
        let err = repo.write_progress(&progress(10, 5, false)).await.unwrap_err();
        assert_eq!(err.deref(), &ErrorKind::Busy);

        sqlx::query("COMMIT").execute(&mut firmware).await.unwrap();
        assert!(repo.progress(10, 1).await.unwrap().is_none());
        repo.write_progress(&progress(10, 6, false)).await.unwrap();
        assert_eq!(repo.progress(10, 1).await.unwrap().unwrap().page, 6);
        db.close().await;
    }
}
