//! Config Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, matching every other crate in the workspace.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A provider (file or environment) could not be read or did not match
    /// the expected shape.
    #[display("could not load configuration")]
    Load,
    /// Configuration loaded, but a value is outside its allowed range.
    #[display("invalid configuration value: {_0}")]
    Invalid(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
