//! Removing finished books from the user's "to read" collections.
//!
//! Two collections may be configured independently: a bookshelf in the
//! device database (by id) and a collection in the host's own store (by
//! name). Each removal is best-effort, and neither one can undo the
//! progress write that preceded it.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use pbsync_explorer::StoreHandle;
use pbsync_host::{CollectionStore, GlobalSettings};
use std::path::Path;
use tracing::instrument;

/// What happened to the book in one of the configured collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// No collection is configured for this side.
    NotConfigured,
    /// The configured collection no longer exists (or the setting is not a
    /// valid id).
    Stale,
    /// The book was not in the collection; nothing changed.
    NotMember,
    Removed,
    /// The removal failed and was rolled back. It is not retried.
    Failed,
}

/// Result of maintaining both collections after a completed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionReport {
    pub device: Removal,
    pub local: Removal,
}

/// Remove a finished book from the configured device and host collections.
#[instrument(skip(store, settings, collections, book_path))]
pub(crate) async fn maintain_collections(
    store: &StoreHandle,
    settings: &dyn GlobalSettings,
    collections: &dyn CollectionStore,
    book_id: i64,
    book_path: &Path,
) -> CollectionReport {
    let device = remove_from_device(store, settings, book_id).await.unwrap_or_else(|e| {
        tracing::warn!(error = ?e, "Could not remove book from device collection");
        Removal::Failed
    });
    let local = remove_from_host(settings, collections, book_path).unwrap_or_else(|e| {
        tracing::warn!(error = ?e, path = %book_path.display(), "Could not remove book from local collection");
        Removal::Failed
    });
    CollectionReport { device, local }
}

async fn remove_from_device(store: &StoreHandle, settings: &dyn GlobalSettings, book_id: i64) -> Result<Removal> {
    let Some(configured) = settings.collection() else {
        return Ok(Removal::NotConfigured);
    };
    let Some(collection_id) = configured.id() else {
        tracing::debug!(collection = ?configured, "Ignoring non-numeric collection id");
        return Ok(Removal::Stale);
    };
    if store.collection(collection_id).await.or_raise(|| ErrorKind::CollectionMaintenance)?.is_none() {
        tracing::debug!(collection_id, "Configured collection no longer exists");
        return Ok(Removal::Stale);
    }
    if !store.is_in_collection(book_id, collection_id).await.or_raise(|| ErrorKind::CollectionMaintenance)? {
        return Ok(Removal::NotMember);
    }
    store.remove_from_collection(book_id, collection_id).await.or_raise(|| ErrorKind::CollectionMaintenance)?;
    tracing::info!(collection_id, "Removed finished book from device collection");
    Ok(Removal::Removed)
}

fn remove_from_host(settings: &dyn GlobalSettings, collections: &dyn CollectionStore, path: &Path) -> Result<Removal> {
    let Some(name) = settings.local_collection().filter(|name| !name.is_empty()) else {
        return Ok(Removal::NotConfigured);
    };
    if !collections.contains(&name, path) || !collections.remove(&name, path) {
        return Ok(Removal::NotMember);
    }
    collections.flush().or_raise(|| ErrorKind::Host)?;
    tracing::info!(collection = %name, "Removed finished book from local collection");
    Ok(Removal::Removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbsync_explorer::MockStore;
    use pbsync_host::CollectionRef;
    use pbsync_host::mock::{MemoryCollections, MemoryGlobalSettings};
    use rstest::rstest;
    use std::sync::Arc;

    const BOOK: &str = "/mnt/ext1/Books/novel.epub";

    fn store() -> Arc<MockStore> {
        Arc::new(MockStore::default().with_collection(7, "To Read").with_membership(10, 7))
    }

    #[tokio::test]
    async fn test_nothing_configured() {
        let store = store();
        let handle: StoreHandle = store.clone();
        let collections = MemoryCollections::default().with_member("To Read", BOOK);
        let report =
            maintain_collections(&handle, &MemoryGlobalSettings::default(), &collections, 10, Path::new(BOOK)).await;
        assert_eq!(report, CollectionReport { device: Removal::NotConfigured, local: Removal::NotConfigured });
        assert_eq!(store.calls().total(), 0);
        assert!(collections.contains("To Read", Path::new(BOOK)));
    }

    #[tokio::test]
    async fn test_removal_is_idempotent() {
        let store = store();
        let handle: StoreHandle = store.clone();
        let settings = MemoryGlobalSettings::default()
            .with_collection(CollectionRef::Id(7))
            .with_local_collection("To Read");
        let collections = MemoryCollections::default().with_member("To Read", BOOK);

        let first = maintain_collections(&handle, &settings, &collections, 10, Path::new(BOOK)).await;
        assert_eq!(first, CollectionReport { device: Removal::Removed, local: Removal::Removed });
        assert!(!store.is_member(10, 7));
        assert_eq!(collections.flushes(), 1);

        let second = maintain_collections(&handle, &settings, &collections, 10, Path::new(BOOK)).await;
        assert_eq!(second, CollectionReport { device: Removal::NotMember, local: Removal::NotMember });
        let calls = store.calls();
        assert_eq!((calls.is_in_collection, calls.remove_from_collection), (2, 1));
        assert_eq!(collections.flushes(), 1);
    }

    #[rstest]
    #[case(CollectionRef::Id(99))]
    #[case(CollectionRef::Id(8))]
    #[case(CollectionRef::Text("To Read".to_string()))]
    #[tokio::test]
    async fn test_stale_collection_is_skipped(#[case] configured: CollectionRef) {
        let store = Arc::new(MockStore::default().with_deleted_collection(8, "Old").with_membership(10, 8));
        let handle: StoreHandle = store.clone();
        let settings = MemoryGlobalSettings::default().with_collection(configured);
        let report =
            maintain_collections(&handle, &settings, &MemoryCollections::default(), 10, Path::new(BOOK)).await;
        assert_eq!(report.device, Removal::Stale);
        assert_eq!(store.calls().remove_from_collection, 0);
    }

    #[tokio::test]
    async fn test_sides_are_independent() {
        let store = store();
        store.fail_removals(true);
        let handle: StoreHandle = store.clone();
        let settings = MemoryGlobalSettings::default()
            .with_collection(CollectionRef::Text("7".to_string()))
            .with_local_collection("To Read");
        let collections = MemoryCollections::default().with_member("To Read", BOOK);

        let report = maintain_collections(&handle, &settings, &collections, 10, Path::new(BOOK)).await;
        assert_eq!(report, CollectionReport { device: Removal::Failed, local: Removal::Removed });
        assert!(store.is_member(10, 7));

        store.fail_removals(false);
        collections.fail_flushes(true);
        let report = maintain_collections(&handle, &settings, &collections, 10, Path::new(BOOK)).await;
        assert_eq!(report, CollectionReport { device: Removal::Removed, local: Removal::NotMember });
    }

    #[tokio::test]
    async fn test_local_flush_failure() {
        let handle: StoreHandle = Arc::new(MockStore::default());
        let settings = MemoryGlobalSettings::default().with_local_collection("To Read");
        let collections = MemoryCollections::default().with_member("To Read", BOOK);
        collections.fail_flushes(true);
        let report = maintain_collections(&handle, &settings, &collections, 10, Path::new(BOOK)).await;
        assert_eq!(report.local, Removal::Failed);
    }
}
