//! Effect traits
//!
//! The attendance pipeline reaches the outside world through exactly two effects: the
//! append-only attendance log and the wall clock. Handlers live in `tapguard-effects`;
//! fault-injecting doubles live in `tapguard-testkit`.

pub mod log;
pub mod time;

pub use log::{AttendanceLogEffects, LogError, RecordFilter, WriterLease};
pub use time::WallClockEffects;
