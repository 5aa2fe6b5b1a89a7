//! Controllable wall clocks

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tapguard_core::WallClockEffects;

use crate::fixtures::test_epoch;

/// Clock frozen at one instant until moved explicitly
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Clock frozen at `at`
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(at)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::at(test_epoch())
    }
}

impl WallClockEffects for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Clock that moves forward by a fixed step on every reading
#[derive(Debug, Clone)]
pub struct SteppingClock {
    next: Arc<Mutex<DateTime<Utc>>>,
    step: Duration,
}

impl SteppingClock {
    /// Clock starting at `start`, advancing `step` per reading
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Arc::new(Mutex::new(start)),
            step,
        }
    }
}

impl WallClockEffects for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock();
        let now = *next;
        *next += self.step;
        now
    }
}
