//! In-memory library store for testing.

use crate::error::{ErrorKind, Result};
use crate::models::{Collection, Progress};
use crate::store::LibraryStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// How many times each [`LibraryStore`] method has been called.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub folder_id: usize,
    pub book_id: usize,
    pub profile_id: usize,
    pub write_progress: usize,
    pub collection: usize,
    pub collections: usize,
    pub is_in_collection: usize,
    pub remove_from_collection: usize,
}
impl Calls {
    /// Total number of database calls of any kind.
    pub fn total(&self) -> usize {
        self.folder_id
            + self.book_id
            + self.profile_id
            + self.write_progress
            + self.collection
            + self.collections
            + self.is_in_collection
            + self.remove_from_collection
    }
}

#[derive(Default)]
struct State {
    folders: HashMap<String, i64>,
    files: HashMap<(i64, String), i64>,
    profiles: HashMap<String, i64>,
    progress: HashMap<(i64, i64), Progress>,
    // id -> (name, deleted)
    collections: BTreeMap<i64, (String, bool)>,
    memberships: HashSet<(i64, i64)>,
    calls: Calls,
    failing_writes: usize,
    failing_lookups: bool,
    failing_removals: bool,
}

/// In-memory stand-in for the device database.
///
/// Records every call so tests can assert on exactly which queries ran, and
/// can be told to fail writes, lookups or collection removals on demand.
///
/// # Examples
///
/// ```
/// use pbsync_explorer::{LibraryStore, MockStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MockStore::default()
///     .with_folder("/mnt/ext1/Books", 1)
///     .with_file(1, "novel.epub", 10);
/// assert_eq!(store.book_id(1, "novel.epub").await.unwrap(), Some(10));
/// assert_eq!(store.calls().book_id, 1);
/// # }
/// ```
#[derive(Default)]
pub struct MockStore {
    state: Mutex<State>,
}

impl MockStore {
    pub fn with_folder(self, name: impl Into<String>, id: i64) -> Self {
        self.lock().folders.insert(name.into(), id);
        self
    }

    pub fn with_file(self, folder_id: i64, filename: impl Into<String>, book_id: i64) -> Self {
        self.lock().files.insert((folder_id, filename.into()), book_id);
        self
    }

    pub fn with_profile(self, name: impl Into<String>, id: i64) -> Self {
        self.lock().profiles.insert(name.into(), id);
        self
    }

    pub fn with_collection(self, id: i64, name: impl Into<String>) -> Self {
        self.lock().collections.insert(id, (name.into(), false));
        self
    }

    pub fn with_deleted_collection(self, id: i64, name: impl Into<String>) -> Self {
        self.lock().collections.insert(id, (name.into(), true));
        self
    }

    pub fn with_membership(self, book_id: i64, collection_id: i64) -> Self {
        self.lock().memberships.insert((book_id, collection_id));
        self
    }

    /// Fail the next `count` calls to [`write_progress`](LibraryStore::write_progress)
    /// with [`ErrorKind::Busy`].
    pub fn fail_writes(&self, count: usize) {
        self.lock().failing_writes = count;
    }

    /// Make every identifier lookup fail with [`ErrorKind::Database`].
    pub fn fail_lookups(&self, fail: bool) {
        self.lock().failing_lookups = fail;
    }

    /// Make every collection removal fail with [`ErrorKind::Database`].
    pub fn fail_removals(&self, fail: bool) {
        self.lock().failing_removals = fail;
    }

    pub fn calls(&self) -> Calls {
        self.lock().calls
    }

    pub fn progress(&self, book_id: i64, profile_id: i64) -> Option<Progress> {
        self.lock().progress.get(&(book_id, profile_id)).cloned()
    }

    pub fn is_member(&self, book_id: i64, collection_id: i64) -> bool {
        self.lock().memberships.contains(&(book_id, collection_id))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not cascade into unrelated assertions.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup<T>(state: &State, found: Option<T>) -> Result<Option<T>> {
        if state.failing_lookups {
            exn::bail!(ErrorKind::Database);
        }
        Ok(found)
    }
}

#[async_trait]
impl LibraryStore for MockStore {
    async fn folder_id(&self, name: &str) -> Result<Option<i64>> {
        let mut state = self.lock();
        state.calls.folder_id += 1;
        let found = state.folders.get(name).copied();
        Self::lookup(&state, found)
    }

    async fn book_id(&self, folder_id: i64, filename: &str) -> Result<Option<i64>> {
        let mut state = self.lock();
        state.calls.book_id += 1;
        let found = state.files.get(&(folder_id, filename.to_string())).copied();
        Self::lookup(&state, found)
    }

    async fn profile_id(&self, name: &str) -> Result<Option<i64>> {
        let mut state = self.lock();
        state.calls.profile_id += 1;
        let found = state.profiles.get(name).copied();
        Self::lookup(&state, found)
    }

    async fn write_progress(&self, progress: &Progress) -> Result<()> {
        let mut state = self.lock();
        state.calls.write_progress += 1;
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            exn::bail!(ErrorKind::Busy);
        }
        state.progress.insert((progress.book_id, progress.profile_id), progress.clone());
        Ok(())
    }

    async fn collection(&self, id: i64) -> Result<Option<Collection>> {
        let mut state = self.lock();
        state.calls.collection += 1;
        Ok(state.collections.get(&id).filter(|(_, deleted)| !deleted).map(|(name, _)| Collection {
            id,
            name: name.clone(),
        }))
    }

    async fn collections(&self) -> Result<Vec<Collection>> {
        let mut state = self.lock();
        state.calls.collections += 1;
        let mut found: Vec<Collection> = state
            .collections
            .iter()
            .filter(|(_, (_, deleted))| !deleted)
            .map(|(id, (name, _))| Collection { id: *id, name: name.clone() })
            .collect();
        found.sort_by_key(|c| (c.name.to_lowercase(), c.id));
        Ok(found)
    }

    async fn is_in_collection(&self, book_id: i64, collection_id: i64) -> Result<bool> {
        let mut state = self.lock();
        state.calls.is_in_collection += 1;
        Ok(state.memberships.contains(&(book_id, collection_id)))
    }

    async fn remove_from_collection(&self, book_id: i64, collection_id: i64) -> Result<()> {
        let mut state = self.lock();
        state.calls.remove_from_collection += 1;
        if state.failing_removals {
            exn::bail!(ErrorKind::Database);
        }
        state.memberships.remove(&(book_id, collection_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;
    use time::UtcDateTime;

    fn progress(page: u32) -> Progress {
        Progress {
            book_id: 10,
            profile_id: 1,
            page,
            total_pages: 100,
            completed: false,
            opened_at: UtcDateTime::now(),
        }
    }

    #[tokio::test]
    async fn test_failing_writes_recover() {
        let store = MockStore::default();
        store.fail_writes(1);
        let err = store.write_progress(&progress(3)).await.unwrap_err();
        assert_eq!(err.deref(), &ErrorKind::Busy);
        store.write_progress(&progress(4)).await.unwrap();
        assert_eq!(store.progress(10, 1).map(|p| p.page), Some(4));
        assert_eq!(store.calls().write_progress, 2);
    }

    #[tokio::test]
    async fn test_deleted_collections_are_hidden() {
        let store = MockStore::default().with_collection(2, "b").with_collection(1, "B").with_deleted_collection(3, "a");
        let ids: Vec<i64> = store.collections().await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, [1, 2]);
        assert!(store.collection(3).await.unwrap().is_none());
        assert_eq!(store.calls().total(), 2);
    }
}
