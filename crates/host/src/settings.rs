//! Per-document and global settings.

use crate::error::{ErrorKind, Result};
use crate::file::{self, lock};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Per-document key holding the reader's book summary (status, rating).
pub const SUMMARY_KEY: &str = "summary";
/// Per-document key the local copy of the synced progress is written under.
pub const PROGRESS_KEY: &str = "pocketbook_sync_progress";
/// Global key for the host-side collection a finished book is removed from.
pub const LOCAL_COLLECTION_KEY: &str = "pocketbook_sync_local_collection";
/// Global key for the device collection a finished book is removed from.
pub const COLLECTION_ID_KEY: &str = "pocketbook_sync_collection_id";

/// Reading status the user (or the reader) assigned to a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Reading,
    Abandoned,
    Complete,
    #[serde(other)]
    Other,
}

/// The `summary` entry of a document's settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub rating: Option<u8>,
}
impl Summary {
    pub fn is_complete(&self) -> bool {
        self.status == Some(Status::Complete)
    }
}

/// Progress as last computed for the document, kept in the document's own
/// settings so the reader can show it without touching the device database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalProgress {
    /// `current_page / total_pages`, `0.0` for an empty flow.
    pub ratio: f64,
    pub percent: u8,
    pub current_page: u32,
    pub total_pages: u32,
    /// Unix timestamp (seconds).
    pub last_sync: i64,
}

/// A configured device collection, as found in the global settings.
///
/// Older settings stored the id as a string, newer ones as a number; both
/// are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionRef {
    Id(i64),
    Text(String),
}
impl CollectionRef {
    /// The numeric id, or `None` if the stored value is not a number.
    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Settings attached to the open document.
pub trait DocumentSettings: Send + Sync {
    fn summary(&self) -> Option<Summary>;

    /// Store `progress` under [`PROGRESS_KEY`].
    fn save_progress(&self, progress: &LocalProgress) -> Result<()>;
}

/// Reader-wide settings.
pub trait GlobalSettings: Send + Sync {
    /// Name of the host collection finished books are removed from.
    fn local_collection(&self) -> Option<String>;

    /// Device collection finished books are removed from.
    fn collection(&self) -> Option<CollectionRef>;

    fn set_local_collection(&self, name: Option<&str>) -> Result<()>;

    fn set_collection(&self, id: Option<i64>) -> Result<()>;
}

/// Document settings persisted as a JSON object next to the document.
///
/// Keys this crate does not know about are preserved untouched.
pub struct JsonDocumentSettings {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}
impl JsonDocumentSettings {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = file::load(&path)?;
        Ok(Self { path, values: Mutex::new(values) })
    }

    /// Conventional sidecar location for a document: `<dir>/<name>.sdr/metadata.json`.
    pub fn sidecar_for(document: impl AsRef<Path>) -> PathBuf {
        let document = document.as_ref();
        // Only the last extension is replaced: `novel.epub` -> `novel.sdr`.
        let mut name = document.file_stem().unwrap_or_default().to_os_string();
        name.push(".sdr");
        document.with_file_name(name).join("metadata.json")
    }

    pub fn progress(&self) -> Option<LocalProgress> {
        let values = lock(&self.values);
        values.get(PROGRESS_KEY).cloned().and_then(|v| serde_json::from_value(v).ok())
    }
}
impl DocumentSettings for JsonDocumentSettings {
    fn summary(&self) -> Option<Summary> {
        let values = lock(&self.values);
        let summary = values.get(SUMMARY_KEY)?.clone();
        match serde_json::from_value(summary) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Ignoring malformed summary");
                None
            },
        }
    }

    fn save_progress(&self, progress: &LocalProgress) -> Result<()> {
        let mut values = lock(&self.values);
        let value = serde_json::to_value(progress).or_raise(|| ErrorKind::Serialization(self.path.clone()))?;
        values.insert(PROGRESS_KEY.to_string(), value);
        file::save(&self.path, &*values)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GlobalValues {
    #[serde(rename = "pocketbook_sync_local_collection", default, skip_serializing_if = "Option::is_none")]
    local_collection: Option<String>,
    #[serde(rename = "pocketbook_sync_collection_id", default, skip_serializing_if = "Option::is_none")]
    collection: Option<CollectionRef>,
    #[serde(flatten)]
    other: Map<String, Value>,
}

/// Global settings persisted as a JSON object.
///
/// Keys this crate does not know about are preserved untouched.
pub struct JsonGlobalSettings {
    path: PathBuf,
    values: Mutex<GlobalValues>,
}
impl JsonGlobalSettings {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = file::load(&path)?;
        Ok(Self { path, values: Mutex::new(values) })
    }
}
impl GlobalSettings for JsonGlobalSettings {
    fn local_collection(&self) -> Option<String> {
        lock(&self.values).local_collection.clone()
    }

    fn collection(&self) -> Option<CollectionRef> {
        lock(&self.values).collection.clone()
    }

    fn set_local_collection(&self, name: Option<&str>) -> Result<()> {
        let mut values = lock(&self.values);
        values.local_collection = name.map(str::to_string);
        file::save(&self.path, &*values)
    }

    fn set_collection(&self, id: Option<i64>) -> Result<()> {
        let mut values = lock(&self.values);
        values.collection = id.map(CollectionRef::Id);
        file::save(&self.path, &*values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"status": "complete", "rating": 5}"#, Some(Status::Complete), true)]
    #[case(r#"{"status": "reading"}"#, Some(Status::Reading), false)]
    #[case(r#"{"status": "tbr"}"#, Some(Status::Other), false)]
    #[case(r#"{"rating": 3}"#, None, false)]
    fn test_summary_status(#[case] json: &str, #[case] status: Option<Status>, #[case] complete: bool) {
        let summary: Summary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.status, status);
        assert_eq!(summary.is_complete(), complete);
    }

    #[rstest]
    #[case(r#"7"#, Some(7))]
    #[case(r#""7""#, Some(7))]
    #[case(r#"" 12 ""#, Some(12))]
    #[case(r#""To Read""#, None)]
    fn test_collection_ref(#[case] json: &str, #[case] expected: Option<i64>) {
        let reference: CollectionRef = serde_json::from_str(json).unwrap();
        assert_eq!(reference.id(), expected);
    }

    #[rstest]
    #[case("/mnt/ext1/Books/novel.epub", "/mnt/ext1/Books/novel.sdr/metadata.json")]
    #[case("/mnt/ext1/Books/archive.fb2.zip", "/mnt/ext1/Books/archive.fb2.sdr/metadata.json")]
    #[case("/mnt/ext1/Books/README", "/mnt/ext1/Books/README.sdr/metadata.json")]
    fn test_sidecar_location(#[case] document: &str, #[case] expected: &str) {
        assert_eq!(JsonDocumentSettings::sidecar_for(document), Path::new(expected));
    }

    #[test]
    fn test_document_settings_keep_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("novel.sdr/metadata.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"summary": {"status": "complete"}, "font_size": 22}"#).unwrap();

        let settings = JsonDocumentSettings::open(&path).unwrap();
        assert!(settings.summary().unwrap().is_complete());
        let progress = LocalProgress {
            ratio: 0.5,
            percent: 50,
            current_page: 21,
            total_pages: 42,
            last_sync: 1_700_000_000,
        };
        settings.save_progress(&progress).unwrap();

        let reopened = JsonDocumentSettings::open(&path).unwrap();
        assert_eq!(reopened.progress(), Some(progress));
        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["font_size"], 22);
        assert_eq!(raw[PROGRESS_KEY]["current_page"], 21);
    }

    #[test]
    fn test_global_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"pocketbook_sync_collection_id": "7", "night_mode": true}"#).unwrap();

        let settings = JsonGlobalSettings::open(&path).unwrap();
        assert_eq!(settings.collection().and_then(|c| c.id()), Some(7));
        assert_eq!(settings.local_collection(), None);
        settings.set_local_collection(Some("To Read")).unwrap();
        settings.set_collection(None).unwrap();

        let reopened = JsonGlobalSettings::open(&path).unwrap();
        assert_eq!(reopened.local_collection().as_deref(), Some("To Read"));
        assert_eq!(reopened.collection(), None);
        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["night_mode"], true);
        assert!(raw.get(COLLECTION_ID_KEY).is_none());
    }
}
