//! Explorer Database Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A device database error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for device database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The database file could not be opened.
    #[display("could not open device database")]
    Connect,
    /// Another process (usually the device firmware) held a lock for longer
    /// than the configured busy timeout.
    #[display("device database is busy")]
    Busy,
    #[display("database error")]
    Database,
    /// A value could not be converted between its Rust and SQLite form.
    #[display("invalid database data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Wrap an [`sqlx::Error`], distinguishing lock contention from
    /// everything else so callers can tell a flaky device from a broken one.
    #[track_caller]
    pub fn database(err: sqlx::Error) -> Error {
        let kind = if is_busy(&err) { Self::Busy } else { Self::Database };
        exn::Exn::from(err).raise(kind)
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes.
fn is_busy(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}
