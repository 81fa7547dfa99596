//! The device the reader runs on.

use time::UtcDateTime;

/// Device-level facts the sync engine needs.
pub trait Device: Send + Sync {
    /// Name of the reader profile currently active on the device, if the
    /// firmware reports one.
    fn active_profile(&self) -> Option<String>;
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> UtcDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;
impl Clock for SystemClock {
    fn now(&self) -> UtcDateTime {
        UtcDateTime::now()
    }
}

/// A device without profile support, e.g. when running off-device.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProfiles;
impl Device for NoProfiles {
    fn active_profile(&self) -> Option<String> {
        None
    }
}
