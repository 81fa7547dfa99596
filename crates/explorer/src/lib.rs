//! Access to the PocketBook "explorer" library database.
//!
//! The firmware keeps a device-wide SQLite database describing every book on
//! the device: where it lives (`folders`, `files`), who is reading it
//! (`profiles`), how far along they are (`books_settings`) and which
//! user-defined collections it belongs to (`bookshelfs`, `bookshelfs_books`).
//! The firmware owns the schema and the file; this crate only reads
//! identifiers, replaces progress rows and removes collection memberships.
//!
//! # Architecture
//! - [`Database`]: the single long-lived connection, opened with a busy
//!   timeout so lock contention with the firmware fails fast instead of
//!   hanging the reader.
//! - [`LibraryStore`]: the async seam the sync engine talks to, shared as a
//!   [`StoreHandle`].
//! - [`Repository`]: the SQLite implementation of [`LibraryStore`].

mod db;
pub mod error;
#[cfg(feature = "mock")]
mod mock;
mod models;
mod repo;
mod store;

pub use crate::db::Database;
#[cfg(feature = "mock")]
pub use crate::mock::{Calls, MockStore};
pub use crate::models::{Collection, Progress};
pub use crate::repo::Repository;
pub use crate::store::LibraryStore;
use std::sync::Arc;

pub type StoreHandle = Arc<dyn LibraryStore + Send + Sync>;
