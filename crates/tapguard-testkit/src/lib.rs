//! tapguard Testing Infrastructure
//!
//! Shared fixtures for every tapguard test suite: genuine tap payloads built with the same
//! cipher a tag uses, controllable clocks, attendance logs that fail on demand, and proptest
//! strategies for tag identities and counters.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! tapguard-testkit = { path = "../tapguard-testkit" }
//! ```
//!
//! ```rust,no_run
//! use tapguard_testkit::*;
//!
//! let tap = TapPayloadBuilder::new(uid("AABBCCDDEE1122"), counter(1)).build();
//! assert_eq!(tap.data.len(), 32);
//! ```

pub mod builders;
pub mod clock;
pub mod fixtures;
pub mod mocks;
pub mod strategies;

pub use builders::{encrypt_payload, BuiltTap, TapPayloadBuilder};
pub use clock::{FixedClock, SteppingClock};
pub use fixtures::*;
pub use mocks::{FailingAttendanceLog, FlakyAttendanceLog};
