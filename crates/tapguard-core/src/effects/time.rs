//! Wall-clock effect

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of the timestamp stamped onto admitted attendance records
pub trait WallClockEffects: Send + Sync {
    /// Current wall-clock instant
    fn now(&self) -> DateTime<Utc>;
}

impl<T: WallClockEffects + ?Sized> WallClockEffects for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
