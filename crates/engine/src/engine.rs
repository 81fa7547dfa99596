//! The sync decision engine and its host-facing entry points.

use crate::collection::maintain_collections;
use crate::error::{ErrorKind, Result};
use crate::outcome::{Cause, Outcome, SkipReason};
use crate::record::{self, SyncRecord};
use crate::resolve::{resolve_book, resolve_profile};
use crate::session::SessionCache;
use crate::write::write_progress;
use exn::{OptionExt, ResultExt};
use pbsync_config::Config;
use pbsync_explorer::{Collection, Progress, StoreHandle};
use pbsync_host::{
    Clock, CollectionStore, Device, Document, DocumentSettings, GlobalSettings, JsonCollections, JsonGlobalSettings,
    NoProfiles, SystemClock,
};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// File names of the JSON host stores inside the settings directory.
const GLOBAL_SETTINGS_FILE: &str = "settings.json";
const COLLECTIONS_FILE: &str = "collections.json";

/// The host collaborators that live as long as the reader does.
#[derive(Clone)]
pub struct Host {
    pub settings: Arc<dyn GlobalSettings>,
    pub collections: Arc<dyn CollectionStore>,
    pub device: Arc<dyn Device>,
    pub clock: Arc<dyn Clock>,
}
impl Host {
    /// Host stores kept as JSON files in `dir`, for readers without stores of
    /// their own. The device is assumed to have no profiles.
    pub fn json(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let settings = JsonGlobalSettings::open(dir.join(GLOBAL_SETTINGS_FILE)).or_raise(|| ErrorKind::Host)?;
        let collections = JsonCollections::open(dir.join(COLLECTIONS_FILE)).or_raise(|| ErrorKind::Host)?;
        Ok(Self {
            settings: Arc::new(settings),
            collections: Arc::new(collections),
            device: Arc::new(NoProfiles),
            clock: Arc::new(SystemClock),
        })
    }

    /// [`Host::json`] in the configured settings directory, or the platform
    /// configuration directory when none is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let dir = config.settings.dir.clone().or_else(Config::config_dir).ok_or_raise(|| ErrorKind::Host)?;
        Self::json(dir)
    }
}

/// Tunables of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Consecutive failed writes after which the device database is left
    /// alone until the document is closed.
    pub circuit_threshold: u32,
    /// An exit this soon after a successful write is not synced again.
    pub exit_debounce: Duration,
    /// Profile progress is stored under when the device has none (or an
    /// unknown one) active.
    pub default_profile_id: i64,
}
impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            circuit_threshold: 3,
            exit_debounce: Duration::from_secs(2),
            default_profile_id: 1,
        }
    }
}
impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            circuit_threshold: config.sync.circuit_threshold,
            exit_debounce: config.sync.exit_debounce(),
            default_profile_id: config.sync.default_profile_id,
        }
    }
}

struct Session {
    document: Arc<dyn Document>,
    settings: Arc<dyn DocumentSettings>,
}

/// Mirrors the reader's position in the open document into the device
/// database.
///
/// The host calls [`open`](Self::open) when a document is opened and one of
/// the session-end handlers whenever the reader closes the document,
/// suspends or exits. Handlers never fail: whatever happened is reported as
/// an [`Outcome`] and logged.
///
/// Handlers take `&mut self`; the host must not run two of them at once.
pub struct Engine {
    store: StoreHandle,
    host: Host,
    options: EngineOptions,
    session: Option<Session>,
    cache: SessionCache,
}

impl Engine {
    pub fn new(store: StoreHandle, host: Host, options: EngineOptions) -> Self {
        Self {
            store,
            host,
            options,
            session: None,
            cache: SessionCache::default(),
        }
    }

    /// Bind a newly opened document. Anything cached for a previous
    /// document is dropped.
    #[instrument(skip_all, fields(path = %document.path().display()))]
    pub fn open(&mut self, document: Arc<dyn Document>, settings: Arc<dyn DocumentSettings>) {
        if self.session.is_some() {
            tracing::debug!("Replacing a session that was never closed");
        }
        self.cache.reset();
        self.session = Some(Session { document, settings });
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The document was closed. Syncs, then forgets the session.
    pub async fn on_close(&mut self) -> Outcome {
        self.end_session(Cause::Close).await
    }

    /// The device is going to sleep. Syncs and keeps the session, so the
    /// resolved identifiers survive the resume.
    pub async fn on_suspend(&mut self) -> Outcome {
        self.end_session(Cause::Suspend).await
    }

    /// The reader is exiting. Syncs unless a write happened moments ago,
    /// then forgets the session.
    pub async fn on_exit(&mut self) -> Outcome {
        self.end_session(Cause::Exit).await
    }

    /// Sync the open document now, without ending anything.
    pub async fn sync_now(&mut self) -> Outcome {
        self.attempt(Cause::Manual).await
    }

    /// Refresh the progress kept in the document's own settings without
    /// touching the device database.
    pub fn refresh_local_progress(&mut self) -> std::result::Result<SyncRecord, SkipReason> {
        let session = self.session.as_ref().ok_or(SkipReason::NoDocument)?;
        record::prepare(&*session.document, &*session.settings, &mut self.cache, self.host.clock.now())
    }

    /// Bookshelves the user can pick from.
    pub async fn available_collections(&self) -> Result<Vec<Collection>> {
        self.store.collections().await.or_raise(|| ErrorKind::Lookup)
    }

    /// Set (or with `None` clear) the device collection finished books are
    /// removed from.
    pub fn choose_collection(&self, id: Option<i64>) -> Result<()> {
        self.host.settings.set_collection(id).or_raise(|| ErrorKind::Host)
    }

    /// Set (or with `None` clear) the host collection finished books are
    /// removed from.
    pub fn choose_local_collection(&self, name: Option<&str>) -> Result<()> {
        let name = name.map(str::trim).filter(|name| !name.is_empty());
        self.host.settings.set_local_collection(name).or_raise(|| ErrorKind::Host)
    }

    #[instrument(skip_all, fields(cause = %cause))]
    async fn end_session(&mut self, cause: Cause) -> Outcome {
        if self.session.is_none() {
            tracing::debug!("No document open");
            return Outcome::Skipped(SkipReason::NoDocument);
        }

        let outcome = if cause == Cause::Exit && self.written_recently() {
            tracing::debug!("Exit right after a write; not syncing again");
            Outcome::Skipped(SkipReason::RecentlySynced)
        } else {
            self.attempt(cause).await
        };

        if cause.ends_session() {
            self.cache.reset();
            self.session = None;
        }
        outcome
    }

    fn written_recently(&self) -> bool {
        let now = self.host.clock.now();
        self.cache.last_sync.is_some_and(|at| now - at < self.options.exit_debounce)
    }

    async fn attempt(&mut self, cause: Cause) -> Outcome {
        let Some(session) = self.session.as_ref() else {
            return Outcome::Skipped(SkipReason::NoDocument);
        };
        let now = self.host.clock.now();

        let record = match record::prepare(&*session.document, &*session.settings, &mut self.cache, now) {
            Ok(record) => record,
            Err(reason) => {
                tracing::debug!(%cause, %reason, "Skipping sync");
                return Outcome::Skipped(reason);
            },
        };

        // Checked after `prepare` so the local progress is still refreshed;
        // an open circuit only rules out database calls.
        if self.cache.is_circuit_open(self.options.circuit_threshold) {
            tracing::debug!(%cause, "Skipping sync; device database writes are disabled");
            return Outcome::Skipped(SkipReason::CircuitOpen);
        }
        // A completion must never be lost to the page debounce.
        if !record.completed && self.cache.last_synced_page == Some(record.page) {
            tracing::debug!(%cause, page = record.page, "Skipping sync; page unchanged");
            return Outcome::Skipped(SkipReason::Unchanged);
        }

        let book_id = match resolve_book(&self.store, &mut self.cache, &record.folder, &record.file).await {
            Ok(book_id) => book_id,
            Err(e) => {
                let reason = match e.deref() {
                    ErrorKind::NotFound(missing) => SkipReason::Unresolved(*missing),
                    _ => SkipReason::LookupFailed,
                };
                tracing::info!(%cause, folder = %record.folder, file = %record.file, error = ?e, "Could not resolve book");
                return Outcome::Skipped(reason);
            },
        };
        let profile_id =
            resolve_profile(&self.store, &*self.host.device, &mut self.cache, self.options.default_profile_id).await;

        let progress = Progress {
            book_id,
            profile_id,
            page: record.page,
            total_pages: record.total_pages,
            completed: record.completed,
            opened_at: record.timestamp,
        };
        if write_progress(&self.store, &mut self.cache, &progress, self.options.circuit_threshold).await.is_err() {
            return Outcome::WriteFailed { consecutive_errors: self.cache.consecutive_db_errors };
        }

        let collections = if record.completed {
            let host = &self.host;
            Some(maintain_collections(&self.store, &*host.settings, &*host.collections, book_id, &record.book_path).await)
        } else {
            None
        };
        Outcome::Written {
            book_id,
            profile_id,
            page: record.page,
            completed: record.completed,
            collections,
        }
    }
}
