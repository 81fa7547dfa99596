//! The progress write and the circuit breaker guarding it.

use crate::error::{ErrorKind, Result};
use crate::session::SessionCache;
use exn::ResultExt;
use pbsync_explorer::{Progress, StoreHandle};
use tracing::instrument;

/// Replace the device's progress row and account for the result.
///
/// The store runs the upsert in its own transaction and rolls it back on
/// failure. Here a success clears the failure count and moves the session's
/// watermark; a failure is counted towards the circuit breaker. Callers must
/// check [`SessionCache::is_circuit_open`] before calling.
///
/// # Errors
/// Returns [`ErrorKind::Transaction`] if the write did not commit.
#[instrument(skip_all, fields(book_id = progress.book_id, page = progress.page))]
pub(crate) async fn write_progress(
    store: &StoreHandle,
    cache: &mut SessionCache,
    progress: &Progress,
    threshold: u32,
) -> Result<()> {
    match store.write_progress(progress).await {
        Ok(()) => {
            cache.record_success(progress.page, progress.opened_at);
            tracing::debug!(completed = progress.completed, "Progress written");
            Ok(())
        },
        Err(e) => {
            let failures = cache.record_failure();
            tracing::warn!(error = ?e, failures, "Progress write failed");
            if failures == threshold {
                tracing::warn!(threshold, "Disabling device database writes until the document is closed");
            }
            Err(e).or_raise(|| ErrorKind::Transaction)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbsync_explorer::MockStore;
    use std::ops::Deref;
    use std::sync::Arc;
    use time::UtcDateTime;

    fn progress(page: u32) -> Progress {
        Progress {
            book_id: 10,
            profile_id: 1,
            page,
            total_pages: 42,
            completed: false,
            opened_at: UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_success_moves_watermark() {
        let store = Arc::new(MockStore::default());
        let handle: StoreHandle = store.clone();
        let mut cache = SessionCache::default();
        cache.record_failure();
        write_progress(&handle, &mut cache, &progress(12), 3).await.unwrap();
        assert_eq!(cache.last_synced_page(), Some(12));
        assert_eq!(cache.consecutive_db_errors(), 0);
        assert_eq!(store.progress(10, 1), Some(progress(12)));
    }

    #[tokio::test]
    async fn test_failure_is_counted() {
        let store = Arc::new(MockStore::default());
        store.fail_writes(3);
        let handle: StoreHandle = store.clone();
        let mut cache = SessionCache::default();
        for expected in 1..=3 {
            let err = write_progress(&handle, &mut cache, &progress(12), 3).await.unwrap_err();
            assert_eq!(err.deref(), &ErrorKind::Transaction);
            assert_eq!(cache.consecutive_db_errors(), expected);
        }
        assert!(cache.is_circuit_open(3));
        assert_eq!(cache.last_synced_page(), None);
    }
}
