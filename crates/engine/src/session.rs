//! Per-document memo of resolved identifiers and sync watermarks.

use time::UtcDateTime;

/// State the engine keeps for the currently open document.
///
/// Identifiers are resolved at most once per document and kept here until
/// the document is closed or the reader exits. Suspending the device keeps
/// everything, so a resume does not repeat any lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCache {
    pub(crate) book_id: Option<i64>,
    pub(crate) profile_id: Option<i64>,
    pub(crate) folder_id: Option<i64>,
    pub(crate) flow: Option<i32>,
    /// Page (device convention) of the last successful write; `None` until
    /// the first one.
    pub(crate) last_synced_page: Option<u32>,
    pub(crate) last_sync: Option<UtcDateTime>,
    pub(crate) consecutive_db_errors: u32,
}

impl SessionCache {
    /// Forget everything. Only called when a document session ends (close or
    /// exit), never on suspend.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn book_id(&self) -> Option<i64> {
        self.book_id
    }

    pub fn profile_id(&self) -> Option<i64> {
        self.profile_id
    }

    pub fn folder_id(&self) -> Option<i64> {
        self.folder_id
    }

    pub fn flow(&self) -> Option<i32> {
        self.flow
    }

    pub fn last_synced_page(&self) -> Option<u32> {
        self.last_synced_page
    }

    pub fn last_sync(&self) -> Option<UtcDateTime> {
        self.last_sync
    }

    pub fn consecutive_db_errors(&self) -> u32 {
        self.consecutive_db_errors
    }

    /// External writes are disabled once `threshold` writes in a row have
    /// failed, until the next [`reset`](Self::reset).
    pub fn is_circuit_open(&self, threshold: u32) -> bool {
        self.consecutive_db_errors >= threshold
    }

    pub(crate) fn record_success(&mut self, page: u32, at: UtcDateTime) {
        self.consecutive_db_errors = 0;
        self.last_synced_page = Some(page);
        self.last_sync = Some(at);
    }

    /// Returns the number of consecutive failures including this one.
    pub(crate) fn record_failure(&mut self) -> u32 {
        self.consecutive_db_errors = self.consecutive_db_errors.saturating_add(1);
        self.consecutive_db_errors
    }
}
