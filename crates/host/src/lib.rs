//! Contracts between pbsync and the e-reader hosting it.
//!
//! The sync engine never reaches into the reader directly. Everything it
//! needs (the open document, its settings, the reader's global settings and
//! collections, the device profile and the clock) is described by a trait in
//! this crate and injected at startup.
//!
//! JSON-file implementations are provided for hosts without their own
//! stores, and in-memory mocks behind the `mock` feature for tests.

mod collections;
mod device;
mod document;
pub mod error;
mod file;
#[cfg(feature = "mock")]
pub mod mock;
mod settings;

pub use crate::collections::{CollectionStore, JsonCollections};
pub use crate::device::{Clock, Device, NoProfiles, SystemClock};
pub use crate::document::{Document, MAIN_FLOW, PageInfo, split_path};
pub use crate::settings::{
    COLLECTION_ID_KEY, CollectionRef, DocumentSettings, GlobalSettings, JsonDocumentSettings, JsonGlobalSettings,
    LOCAL_COLLECTION_KEY, LocalProgress, PROGRESS_KEY, SUMMARY_KEY, Status, Summary,
};
