//! Layer 3: Wall-clock handler
//!
//! Stateless production implementation of [`WallClockEffects`]. Fixed and stepping clocks
//! for tests live in `tapguard-testkit`.

use chrono::{DateTime, Utc};
use tapguard_core::WallClockEffects;

/// Clock backed by the operating system's UTC time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock
    pub fn new() -> Self {
        Self
    }
}

impl WallClockEffects for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
