//! Identifier resolution against the device database, memoized per session.

use crate::error::{ErrorKind, Missing, Result};
use crate::session::SessionCache;
use exn::{OptionExt, ResultExt};
use pbsync_explorer::StoreHandle;
use pbsync_host::Device;

/// Resolves the device's book id for `folder`/`file`.
///
/// The folder id and book id are each looked up at most once per session.
/// A missing row is not cached, so a book the device indexes later is picked
/// up by the next attempt.
///
/// # Errors
/// - [`ErrorKind::NotFound`] if the folder or file is unknown to the device.
/// - [`ErrorKind::Lookup`] if the database failed while looking.
pub(crate) async fn resolve_book(
    store: &StoreHandle,
    cache: &mut SessionCache,
    folder: &str,
    file: &str,
) -> Result<i64> {
    if let Some(book_id) = cache.book_id {
        return Ok(book_id);
    }

    let folder_id = match cache.folder_id {
        Some(id) => id,
        None => {
            let id = store
                .folder_id(folder)
                .await
                .or_raise(|| ErrorKind::Lookup)?
                .ok_or_raise(|| ErrorKind::NotFound(Missing::Folder))?;
            *cache.folder_id.insert(id)
        },
    };

    let book_id = store
        .book_id(folder_id, file)
        .await
        .or_raise(|| ErrorKind::Lookup)?
        .ok_or_raise(|| ErrorKind::NotFound(Missing::Book))?;
    tracing::debug!(folder_id, book_id, file, "Resolved book");
    Ok(*cache.book_id.insert(book_id))
}

/// Resolves the device profile the progress is stored under.
///
/// Never fails: a device without profiles, an unknown profile name and a
/// failing lookup all fall back to `default_id`. The result, fallback
/// included, is cached for the session.
pub(crate) async fn resolve_profile(
    store: &StoreHandle,
    device: &dyn Device,
    cache: &mut SessionCache,
    default_id: i64,
) -> i64 {
    if let Some(profile_id) = cache.profile_id {
        return profile_id;
    }

    let profile_id = match device.active_profile() {
        None => default_id,
        Some(name) => match store.profile_id(&name).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::debug!(profile = %name, default_id, "Unknown profile; using default");
                default_id
            },
            Err(e) => {
                tracing::info!(profile = %name, error = ?e, default_id, "Profile lookup failed; using default");
                default_id
            },
        },
    };
    *cache.profile_id.insert(profile_id)
}
