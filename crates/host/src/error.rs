//! Host Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A host store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for host store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A settings or collection file could not be read or written.
    #[display("I/O error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// A settings or collection file exists but is not valid JSON of the
    /// expected shape.
    #[display("malformed store: {}", _0.display())]
    Serialization(#[error(not(source))] PathBuf),
    /// The store has no usable location (e.g. a path without a parent).
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
