//! In-memory host collaborators for testing.
//!
//! Everything here sits behind interior mutability so a test can keep an
//! `Arc` to a mock, hand a clone to the engine, and then both drive and
//! inspect it.

use crate::collections::CollectionStore;
use crate::device::{Clock, Device};
use crate::document::{Document, MAIN_FLOW, PageInfo};
use crate::error::{ErrorKind, Result};
use crate::file::lock;
use crate::settings::{CollectionRef, DocumentSettings, GlobalSettings, LocalProgress, Status, Summary};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use time::UtcDateTime;

/// A document whose position is set directly by the test.
///
/// # Examples
///
/// ```
/// use pbsync_host::{Document, mock::MockDocument};
///
/// let doc = MockDocument::new("/mnt/ext1/Books/novel.epub", 42);
/// doc.goto(7);
/// let info = doc.page_info(doc.current_page());
/// assert_eq!((info.flow, info.page, info.total), (0, 7, 42));
/// ```
pub struct MockDocument {
    path: PathBuf,
    position: Mutex<(u32, PageInfo)>,
}
impl MockDocument {
    /// A single-flow document of `total` pages, open on its first page.
    pub fn new(path: impl Into<PathBuf>, total: u32) -> Self {
        let info = PageInfo { flow: MAIN_FLOW, page: 1, total };
        Self {
            path: path.into(),
            position: Mutex::new((1, info)),
        }
    }

    /// Move to `page` of the main flow, keeping the current total.
    pub fn goto(&self, page: u32) {
        let mut position = lock(&self.position);
        let total = position.1.total;
        *position = (page, PageInfo { flow: MAIN_FLOW, page, total });
    }

    /// Move to `page` of `total` inside `flow`.
    pub fn goto_flow(&self, flow: i32, page: u32, total: u32) {
        *lock(&self.position) = (page, PageInfo { flow, page, total });
    }
}
impl Document for MockDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn current_page(&self) -> u32 {
        lock(&self.position).0
    }

    fn page_info(&self, _page: u32) -> PageInfo {
        lock(&self.position).1
    }
}

/// Document settings that remember every saved progress entry.
#[derive(Default)]
pub struct MemoryDocumentSettings {
    summary: Mutex<Option<Summary>>,
    saved: Mutex<Vec<LocalProgress>>,
    failing: Mutex<bool>,
}
impl MemoryDocumentSettings {
    pub fn with_status(self, status: Status) -> Self {
        self.set_status(status);
        self
    }

    pub fn set_status(&self, status: Status) {
        *lock(&self.summary) = Some(Summary { status: Some(status), rating: None });
    }

    /// Make [`save_progress`](DocumentSettings::save_progress) fail.
    pub fn fail_saves(&self, fail: bool) {
        *lock(&self.failing) = fail;
    }

    pub fn saved(&self) -> Vec<LocalProgress> {
        lock(&self.saved).clone()
    }

    pub fn last_saved(&self) -> Option<LocalProgress> {
        lock(&self.saved).last().cloned()
    }
}
impl DocumentSettings for MemoryDocumentSettings {
    fn summary(&self) -> Option<Summary> {
        lock(&self.summary).clone()
    }

    fn save_progress(&self, progress: &LocalProgress) -> Result<()> {
        if *lock(&self.failing) {
            exn::bail!(ErrorKind::Io(PathBuf::from("memory")));
        }
        lock(&self.saved).push(progress.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryGlobalSettings {
    local_collection: Mutex<Option<String>>,
    collection: Mutex<Option<CollectionRef>>,
}
impl MemoryGlobalSettings {
    pub fn with_local_collection(self, name: impl Into<String>) -> Self {
        *lock(&self.local_collection) = Some(name.into());
        self
    }

    pub fn with_collection(self, collection: CollectionRef) -> Self {
        *lock(&self.collection) = Some(collection);
        self
    }
}
impl GlobalSettings for MemoryGlobalSettings {
    fn local_collection(&self) -> Option<String> {
        lock(&self.local_collection).clone()
    }

    fn collection(&self) -> Option<CollectionRef> {
        lock(&self.collection).clone()
    }

    fn set_local_collection(&self, name: Option<&str>) -> Result<()> {
        *lock(&self.local_collection) = name.map(str::to_string);
        Ok(())
    }

    fn set_collection(&self, id: Option<i64>) -> Result<()> {
        *lock(&self.collection) = id.map(CollectionRef::Id);
        Ok(())
    }
}

/// Collection store that counts flushes.
#[derive(Default)]
pub struct MemoryCollections {
    collections: Mutex<BTreeMap<String, BTreeSet<PathBuf>>>,
    flushes: Mutex<usize>,
    failing: Mutex<bool>,
}
impl MemoryCollections {
    pub fn with_member(self, collection: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        lock(&self.collections).entry(collection.into()).or_default().insert(path.into());
        self
    }

    /// Make [`flush`](CollectionStore::flush) fail.
    pub fn fail_flushes(&self, fail: bool) {
        *lock(&self.failing) = fail;
    }

    pub fn flushes(&self) -> usize {
        *lock(&self.flushes)
    }
}
impl CollectionStore for MemoryCollections {
    fn contains(&self, collection: &str, path: &Path) -> bool {
        lock(&self.collections).get(collection).is_some_and(|paths| paths.contains(path))
    }

    fn remove(&self, collection: &str, path: &Path) -> bool {
        lock(&self.collections).get_mut(collection).is_some_and(|paths| paths.remove(path))
    }

    fn flush(&self) -> Result<()> {
        *lock(&self.flushes) += 1;
        if *lock(&self.failing) {
            exn::bail!(ErrorKind::Io(PathBuf::from("memory")));
        }
        Ok(())
    }
}

/// Device reporting a fixed profile, counting how often it was asked.
#[derive(Default)]
pub struct MockDevice {
    profile: Option<String>,
    queries: Mutex<usize>,
}
impl MockDevice {
    pub fn with_profile(name: impl Into<String>) -> Self {
        Self {
            profile: Some(name.into()),
            queries: Mutex::new(0),
        }
    }

    pub fn queries(&self) -> usize {
        *lock(&self.queries)
    }
}
impl Device for MockDevice {
    fn active_profile(&self) -> Option<String> {
        *lock(&self.queries) += 1;
        self.profile.clone()
    }
}

/// A clock that only moves when told to.
pub struct MockClock {
    now: Mutex<UtcDateTime>,
}
impl MockClock {
    pub fn at(unix_timestamp: i64) -> Self {
        // Out-of-range timestamps are a broken test, not a runtime condition.
        let Ok(now) = UtcDateTime::from_unix_timestamp(unix_timestamp) else {
            panic!("MockClock::at: invalid timestamp {unix_timestamp}");
        };
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}
impl Default for MockClock {
    fn default() -> Self {
        Self::at(1_700_000_000)
    }
}
impl Clock for MockClock {
    fn now(&self) -> UtcDateTime {
        *lock(&self.now)
    }
}
