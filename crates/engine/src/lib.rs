//! Reading-progress synchronisation for PocketBook devices.
//!
//! The reader tracks where the user is in the open document; the device
//! keeps its own copy in the explorer library database, which is what the
//! device's home screen and library views show. This crate keeps the two in
//! step whenever a reading session is interrupted.
//!
//! # Architecture
//! - [`Engine`]: receives the host's lifecycle events (close, suspend, exit)
//!   and decides whether the current position is worth writing.
//! - [`SessionCache`]: identifiers and watermarks memoized for the open
//!   document, dropped when it is closed.
//! - Identifier resolution: folder, book and profile ids, each looked up at
//!   most once per session.
//! - Progress write: one replacing upsert per attempt, guarded by a circuit
//!   breaker so a locked or broken database cannot stall the reader.
//! - Collection maintenance: a finished book leaves the configured device
//!   and host collections.
//!
//! # Example
//!
//! ```no_run
//! use pbsync_config::Config;
//! use pbsync_engine::{Engine, EngineOptions, Host};
//! use pbsync_explorer::{Database, Repository};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let config = Config::default();
//! let db = Database::connect(&config.database.path, config.database.busy_timeout()).await.unwrap();
//! let host = Host::from_config(&config).unwrap();
//! let mut engine = Engine::new(Arc::new(Repository::from(&db)), host, EngineOptions::from(&config));
//! // ... engine.open(document, settings) when the reader opens a book ...
//! let outcome = engine.on_close().await;
//! # }
//! ```

mod collection;
mod engine;
pub mod error;
mod outcome;
mod record;
mod resolve;
mod session;
mod write;

pub use crate::collection::{CollectionReport, Removal};
pub use crate::engine::{Engine, EngineOptions, Host};
pub use crate::outcome::{Cause, Outcome, SkipReason};
pub use crate::record::{SyncRecord, device_page, local_progress};
pub use crate::session::SessionCache;
