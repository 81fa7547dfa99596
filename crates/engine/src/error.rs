//! Engine Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! None of these ever reach the host: the session-end handlers log them and
//! report an [`Outcome`](crate::Outcome) instead.

use derive_more::{Display, Error};

/// An engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a failed sync attempt.
///
/// ### Recoverable, attempt aborted
/// - [`ErrorKind::NotFound`]
/// - [`ErrorKind::Lookup`]
///
/// ### Counted towards the circuit breaker
/// - [`ErrorKind::Transaction`]
///
/// ### Isolated side effects
/// - [`ErrorKind::CollectionMaintenance`]
/// - [`ErrorKind::Host`]
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The device database has no row for the document (yet).
    #[display("{_0} not found in device database")]
    NotFound(#[error(not(source))] Missing),
    /// An identifier lookup failed for a reason other than a missing row.
    #[display("identifier lookup failed")]
    Lookup,
    /// Begin, execute or commit of the progress upsert failed.
    #[display("progress transaction failed")]
    Transaction,
    /// Removing a finished book from a collection failed.
    #[display("collection maintenance failed")]
    CollectionMaintenance,
    /// A host store (settings, collections) failed.
    #[display("host store failed")]
    Host,
}

/// What could not be found while resolving a document's identifiers.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    #[display("folder")]
    Folder,
    #[display("book")]
    Book,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A book not indexed yet may well be indexed by the next attempt.
        matches!(self, Self::NotFound(_) | Self::Lookup | Self::Transaction)
    }
}
