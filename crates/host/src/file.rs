//! JSON files shared by the file-backed stores.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Read a JSON file, treating a missing file as an empty (default) store.
pub(crate) fn load<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Io(path.to_path_buf())),
    };
    serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Serialization(path.to_path_buf()))
}

/// Write a JSON file atomically: a temporary sibling is written in full and
/// then renamed over the original, so the reader crashing mid-write never
/// leaves a truncated store behind.
pub(crate) fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_raise(|| ErrorKind::InvalidPath(path.to_path_buf()))?;
    std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
    let temp = tempfile::NamedTempFile::new_in(parent).or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value).or_raise(|| ErrorKind::Serialization(path.to_path_buf()))?;
        writer.flush().or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    }
    temp.as_file().sync_all().or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    temp.persist(path).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    tracing::trace!(path = %path.display(), "Store written");
    Ok(())
}

/// Host objects are only touched from the reader's event thread; a poisoned
/// lock means an earlier panic, not a data race, so the data is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
