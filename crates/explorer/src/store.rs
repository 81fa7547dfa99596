//! The seam between the sync engine and the device database.

use crate::error::Result;
use crate::models::{Collection, Progress};
use async_trait::async_trait;

/// Every query the sync engine makes against the device database.
///
/// [`Repository`](crate::Repository) implements this against SQLite. Lookups
/// return `Ok(None)` when nothing matches; `Err` is reserved for the database
/// itself misbehaving (locked, corrupt, gone), so callers can treat "not
/// indexed yet" and "broken" differently.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Id of the folder with exactly this name (the firmware stores absolute
    /// directory paths, without a trailing slash).
    async fn folder_id(&self, name: &str) -> Result<Option<i64>>;

    /// Book id of the file `filename` inside folder `folder_id`.
    async fn book_id(&self, folder_id: i64, filename: &str) -> Result<Option<i64>>;

    /// Id of the reader profile called `name`.
    async fn profile_id(&self, name: &str) -> Result<Option<i64>>;

    /// Replace the stored position for `(book_id, profile_id)` in its own
    /// transaction. Any previous row for the key is overwritten, never merged.
    async fn write_progress(&self, progress: &Progress) -> Result<()>;

    /// A collection by id, or `None` if it does not exist or was deleted.
    async fn collection(&self, id: i64) -> Result<Option<Collection>>;

    /// All collections that have not been deleted, ordered by name.
    async fn collections(&self) -> Result<Vec<Collection>>;

    async fn is_in_collection(&self, book_id: i64, collection_id: i64) -> Result<bool>;

    /// Remove a book from a collection in its own transaction. Removing a
    /// book that is not a member succeeds and changes nothing.
    async fn remove_from_collection(&self, book_id: i64, collection_id: i64) -> Result<()>;
}
