//! Turning the reader's current position into something worth syncing.

use crate::outcome::SkipReason;
use crate::session::SessionCache;
use pbsync_host::{Document, DocumentSettings, LocalProgress, MAIN_FLOW, split_path};
use std::path::PathBuf;
use time::UtcDateTime;

/// One sync attempt's view of the open document. Recomputed every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRecord {
    pub folder: String,
    pub file: String,
    pub book_path: PathBuf,
    /// Current page in the device convention (see [`device_page`]).
    pub page: u32,
    pub total_pages: u32,
    pub completed: bool,
    pub timestamp: UtcDateTime,
}

/// The device stores the first page as `0`; every other page keeps its
/// 1-based number.
pub fn device_page(page: u32) -> u32 {
    if page == 1 { 0 } else { page }
}

/// Progress as shown by the reader, for a 1-based `page` out of `total`.
pub fn local_progress(page: u32, total: u32, at: UtcDateTime) -> LocalProgress {
    let ratio = match total {
        0 => 0.0,
        total => f64::from(page) / f64::from(total),
    };
    LocalProgress {
        ratio,
        percent: (ratio * 100.0).floor().clamp(0.0, 100.0) as u8,
        current_page: page,
        total_pages: total,
        last_sync: at.unix_timestamp(),
    }
}

/// Build the [`SyncRecord`] for the document's current position.
///
/// The local copy of the progress is refreshed as a side effect, whatever
/// happens to the external sync afterwards. Returns the reason to skip when
/// the document cannot be synced at all.
pub(crate) fn prepare(
    document: &dyn Document,
    settings: &dyn DocumentSettings,
    cache: &mut SessionCache,
    now: UtcDateTime,
) -> Result<SyncRecord, SkipReason> {
    let (folder, file) = split_path(document.path());
    if folder.is_empty() || file.is_empty() {
        return Err(SkipReason::MissingPath);
    }

    let current = document.current_page();
    let info = document.page_info(current);
    let flow = *cache.flow.get_or_insert(info.flow);
    if flow != MAIN_FLOW {
        return Err(SkipReason::NonLinearFlow);
    }

    let (page, total) = (info.page, info.total);
    let finished = total > 0 && page == total;
    let completed = settings.summary().is_some_and(|s| s.is_complete()) || finished;

    if let Err(e) = settings.save_progress(&local_progress(page, total, now)) {
        tracing::warn!(error = ?e, "Could not save local progress");
    }

    Ok(SyncRecord {
        folder,
        file,
        book_path: document.path().to_path_buf(),
        page: device_page(page),
        total_pages: total,
        completed,
        timestamp: now,
    })
}
