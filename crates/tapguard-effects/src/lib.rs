//! # tapguard Effects - Layer 3: Effect Handlers
//!
//! **Purpose**: Stateless and single-store implementations of the effect traits declared in
//! `tapguard-core`.
//!
//! # Architecture Constraints
//!
//! **Layer 3 depends only on tapguard-core.**
//! - YES Attendance log backends (in-memory, JSON-lines file)
//! - YES System clock
//! - NO admission logic or caching (that's `tapguard-attendance`)
//! - NO fault-injecting doubles (those belong in `tapguard-testkit`)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Attendance log handlers
pub mod log;

/// Wall-clock handler
pub mod time;

pub use log::{JsonlAttendanceLog, MemoryAttendanceLog};
pub use time::SystemClock;
