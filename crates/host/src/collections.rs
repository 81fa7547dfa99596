//! The reader's own collections: named sets of document paths.

use crate::error::Result;
use crate::file::{self, lock};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The host's collection store.
///
/// Removals only change the in-memory view; [`flush`](Self::flush) persists
/// them.
pub trait CollectionStore: Send + Sync {
    fn contains(&self, collection: &str, path: &Path) -> bool;

    /// Remove `path` from `collection`. Returns `true` if it was a member.
    fn remove(&self, collection: &str, path: &Path) -> bool;

    /// Persist pending changes.
    fn flush(&self) -> Result<()>;
}

type Collections = BTreeMap<String, BTreeSet<PathBuf>>;

/// Collections persisted as a JSON object of `name -> [paths]`.
pub struct JsonCollections {
    path: PathBuf,
    collections: Mutex<Collections>,
}
impl JsonCollections {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let collections = file::load(&path)?;
        Ok(Self { path, collections: Mutex::new(collections) })
    }

    /// Add `path` to `collection`, creating the collection if needed. Not
    /// persisted until [`flush`](CollectionStore::flush).
    pub fn insert(&self, collection: &str, path: impl Into<PathBuf>) -> bool {
        lock(&self.collections).entry(collection.to_string()).or_default().insert(path.into())
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.collections).keys().cloned().collect()
    }
}
impl CollectionStore for JsonCollections {
    fn contains(&self, collection: &str, path: &Path) -> bool {
        lock(&self.collections).get(collection).is_some_and(|paths| paths.contains(path))
    }

    fn remove(&self, collection: &str, path: &Path) -> bool {
        // Emptied collections are kept: the user created them, only they delete them.
        lock(&self.collections).get_mut(collection).is_some_and(|paths| paths.remove(path))
    }

    fn flush(&self) -> Result<()> {
        let collections = lock(&self.collections);
        file::save(&self.path, &*collections)
    }
}
