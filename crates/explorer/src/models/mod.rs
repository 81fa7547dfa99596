mod collection;
mod progress;

pub use self::collection::Collection;
pub use self::progress::Progress;
pub(crate) use self::progress::ProgressRow;
