//! The open document, as the reader's view exposes it.

use std::path::Path;

/// Flow id of the main, linear reading sequence.
pub const MAIN_FLOW: i32 = 0;

/// Where a rendered page sits inside the document's flows.
///
/// Documents may be split into flows: flow [`MAIN_FLOW`] is the linear body
/// of the book, other flows hold auxiliary regions such as footnotes that the
/// reader pages through separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub flow: i32,
    /// 1-based page number within `flow`.
    pub page: u32,
    /// Number of pages in `flow`.
    pub total: u32,
}
impl PageInfo {
    pub fn is_linear(&self) -> bool {
        self.flow == MAIN_FLOW
    }
}

/// Read-only view of the document currently open in the reader.
pub trait Document: Send + Sync {
    /// Absolute path of the document on the device.
    fn path(&self) -> &Path;

    /// Raw page number the reader is currently showing (across all flows).
    fn current_page(&self) -> u32;

    /// Map a raw page number to its flow and in-flow position.
    fn page_info(&self, page: u32) -> PageInfo;
}

/// Split a document path into the folder name and file name the device
/// database indexes it under.
///
/// The folder is the absolute parent directory without a trailing slash.
/// Either part is empty when it cannot be determined (no parent, a root-level
/// file, or a non UTF-8 path); such documents cannot be synced.
///
/// ```
/// use pbsync_host::split_path;
///
/// assert_eq!(
///     split_path("/mnt/ext1/Books/Fiction/novel.epub"),
///     ("/mnt/ext1/Books/Fiction".to_string(), "novel.epub".to_string()),
/// );
/// assert_eq!(split_path("novel.epub"), (String::new(), "novel.epub".to_string()));
/// ```
pub fn split_path(path: impl AsRef<Path>) -> (String, String) {
    let path = path.as_ref();
    let folder = path
        .parent()
        .and_then(Path::to_str)
        .map(|folder| folder.trim_end_matches('/').to_string())
        .unwrap_or_default();
    let file = path.file_name().and_then(|name| name.to_str()).map(str::to_string).unwrap_or_default();
    (folder, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/mnt/ext1/Books/Fiction/novel.epub", "/mnt/ext1/Books/Fiction", "novel.epub")]
    #[case("/mnt/ext1/novel.epub", "/mnt/ext1", "novel.epub")]
    #[case("/novel.epub", "", "novel.epub")]
    #[case("novel.epub", "", "novel.epub")]
    #[case("/mnt/ext1/Books/", "/mnt/ext1", "Books")]
    #[case("/", "", "")]
    #[case("", "", "")]
    fn test_split_path(#[case] path: &str, #[case] folder: &str, #[case] file: &str) {
        assert_eq!(split_path(path), (folder.to_string(), file.to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_split_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        let path = Path::new(OsStr::from_bytes(b"/mnt/ext1/\xff/novel.epub"));
        assert_eq!(split_path(path), (String::new(), "novel.epub".to_string()));
    }
}
