//! # tapguard Attendance - Layer 4: Admission
//!
//! **Purpose**: Admit each physical tap exactly once. A tap is admitted when its payload
//! decodes, its integrity code checks out (if enforced), and its counter is strictly above
//! every counter previously accepted for the same tag.
//!
//! # Architecture Constraints
//!
//! **Layer 4 depends on tapguard-core and tapguard-codec.**
//! - YES Counter ledger over the attendance log effect
//! - YES Keyed admission locks with bounded waits
//! - YES Request parsing and page mapping
//! - NO concrete log backends (inject any `AttendanceLogEffects`)
//! - NO HTTP serving or HTML templating
//!
//! ## Concurrency contract
//!
//! Admission decisions for one tag are serialized by that tag's lock, held from the ledger
//! read through the ledger advance. Decisions for different tags proceed in parallel unless
//! the deployment selects a global lock.
//!
//! ## Crash safety
//!
//! The log append happens before the ledger advance. A crash between the two leaves a
//! durable record and a stale cache, and the next cache miss rescans the log.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authenticator;
pub mod ledger;
pub mod locks;
pub mod presentation;
pub mod request;

pub use authenticator::{
    AttendanceAuthenticator, DecisionSummary, RejectReason, TapDecision, TapOutcome,
};
pub use ledger::{LedgerError, LedgerStats, TapCounterLedger};
pub use locks::{LockTimeout, TagLockGuard, TagLocks};
pub use presentation::{Page, PageCategory, PageRenderer, PlainTextRenderer};
pub use request::{RequestError, TapRequest};
