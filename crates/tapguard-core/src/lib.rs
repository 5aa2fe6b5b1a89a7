//! # tapguard Core - Layer 1: Foundation
//!
//! **Purpose**: Define the attendance domain vocabulary and the effect traits every other
//! tapguard crate is written against.
//!
//! # Architecture Constraints
//!
//! **Layer 1 depends on no other tapguard crate.**
//! - YES Tag identities, tap counters, high-water marks and attendance records
//! - YES Effect traits for the append-only attendance log and the wall clock
//! - YES Secret key handling and deployment configuration
//! - NO cryptography beyond key hygiene (that's `tapguard-codec`)
//! - NO effect handler implementations (that's `tapguard-effects`)
//! - NO admission logic (that's `tapguard-attendance`)
//!
//! ## Core Concepts
//!
//! - **TagIdentity**: the 7-byte UID a tag embeds in every encrypted tap payload
//! - **TapCounter**: the tag's monotonic 24-bit read counter
//! - **HighWaterMark**: the largest counter accepted so far for a tag, or `Unseen`
//! - **AttendanceRecord**: one immutable row of the append-only attendance log

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Deployment configuration and validation
pub mod config;

/// Effect traits for the attendance log and wall clock
pub mod effects;

/// Secret key material
pub mod secret;

/// Attendance domain types
pub mod types;

pub use config::{
    ConfigError, LedgerConfig, LockConfig, LockScope, LogConfig, ScanFailurePolicy,
    TapGuardConfig,
};
pub use effects::{
    AttendanceLogEffects, LogError, RecordFilter, WallClockEffects, WriterLease,
};
pub use secret::{KeyError, SecretKey};
pub use types::{
    AttendanceRecord, HighWaterMark, RecordId, TagIdentity, TagIdentityError, TapCounter,
    TapCounterError,
};
