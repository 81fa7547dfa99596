use crate::collection::CollectionReport;
use crate::error::Missing;
use derive_more::Display;

/// What ended (or interrupted) a reading session.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    #[display("close")]
    Close,
    #[display("suspend")]
    Suspend,
    #[display("exit")]
    Exit,
    /// Explicit request from the user; not a session boundary.
    #[display("manual")]
    Manual,
}
impl Cause {
    /// Whether the session cache is dropped after the attempt.
    pub fn ends_session(self) -> bool {
        matches!(self, Self::Close | Self::Exit)
    }
}

/// The outcome of a single sync attempt.
///
/// Nothing the engine does is ever surfaced to the host as an error; every
/// failure degrades into one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No external write was attempted.
    Skipped(SkipReason),
    /// The progress row was replaced.
    Written {
        book_id: i64,
        profile_id: i64,
        /// Page as stored (device convention).
        page: u32,
        completed: bool,
        /// Present only when the book was completed.
        collections: Option<CollectionReport>,
    },
    /// The progress transaction failed and was rolled back.
    WriteFailed {
        /// Failures in a row, including this one.
        consecutive_errors: u32,
    },
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    #[display("no document open")]
    NoDocument,
    #[display("document path has no folder or file name")]
    MissingPath,
    #[display("position is outside the main flow")]
    NonLinearFlow,
    #[display("page unchanged since last sync")]
    Unchanged,
    #[display("device database writes disabled for this session")]
    CircuitOpen,
    #[display("synced moments ago")]
    RecentlySynced,
    #[display("{_0} not indexed by the device")]
    Unresolved(Missing),
    #[display("identifier lookup failed")]
    LookupFailed,
}
