//! Attendance log handlers
//!
//! - [`MemoryAttendanceLog`]: process-local, for tests and single-run tooling
//! - [`JsonlAttendanceLog`]: one JSON row per line in an append-only file

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlAttendanceLog;
pub use memory::MemoryAttendanceLog;
