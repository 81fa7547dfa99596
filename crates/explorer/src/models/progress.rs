use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::UtcDateTime;

/// Reading position of one book for one profile, as the device stores it.
///
/// Pages use the device convention: the first page is stored as `0` rather
/// than `1`. Conversion happens before a [`Progress`] is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub book_id: i64,
    pub profile_id: i64,
    pub page: u32,
    pub total_pages: u32,
    pub completed: bool,
    pub opened_at: UtcDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ProgressRow {
    pub(crate) bookid: i64,
    pub(crate) profileid: i64,
    pub(crate) cpage: Option<i64>,
    pub(crate) npage: Option<i64>,
    pub(crate) completed: Option<i64>,
    pub(crate) opentime: Option<i64>,
}
impl From<&Progress> for ProgressRow {
    fn from(progress: &Progress) -> Self {
        Self {
            bookid: progress.book_id,
            profileid: progress.profile_id,
            cpage: Some(i64::from(progress.page)),
            npage: Some(i64::from(progress.total_pages)),
            completed: Some(i64::from(progress.completed)),
            opentime: Some(progress.opened_at.unix_timestamp()),
        }
    }
}
impl TryFrom<ProgressRow> for Progress {
    type Error = Error;
    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        // The firmware leaves columns NULL for books that were indexed but
        // never opened.
        Ok(Self {
            book_id: row.bookid,
            profile_id: row.profileid,
            page: u32::try_from(row.cpage.unwrap_or(0)).or_raise(|| ErrorKind::InvalidData("page"))?,
            total_pages: u32::try_from(row.npage.unwrap_or(0)).or_raise(|| ErrorKind::InvalidData("total pages"))?,
            completed: row.completed.unwrap_or(0) != 0,
            opened_at: UtcDateTime::from_unix_timestamp(row.opentime.unwrap_or(0))
                .or_raise(|| ErrorKind::InvalidData("open time"))?,
        })
    }
}
