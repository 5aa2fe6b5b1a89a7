//! Append-only attendance log effect
//!
//! The log is the single source of truth for which taps were admitted. It supports durable
//! append and filtered scan; nothing is ever updated or deleted. Logs that several processes
//! write at once also hand out a [`WriterLease`] that serializes admissions across them.

use crate::types::{AttendanceRecord, RecordId, TagIdentity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Error type for attendance log operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum LogError {
    /// The backing store could not be reached
    #[error("attendance log unavailable: {reason}")]
    Unavailable {
        /// Description of the failure
        reason: String,
    },

    /// A stored row could not be interpreted
    #[error("attendance log corrupt at row {line}: {reason}")]
    Corrupt {
        /// One-based row number
        line: usize,
        /// Description of the failure
        reason: String,
    },

    /// A record with the same identifier already exists
    #[error("attendance record {record_id} already exists")]
    DuplicateRecord {
        /// Conflicting identifier
        record_id: RecordId,
    },

    /// Another writer held the log's writer lease for the whole bounded wait
    #[error("attendance log writer lease not acquired within {waited:?}")]
    WriterBusy {
        /// How long the caller waited
        waited: Duration,
    },
}

impl LogError {
    /// Create an unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a corrupt-row error
    pub fn corrupt(line: usize, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            line,
            reason: reason.into(),
        }
    }
}

/// Predicate applied by [`AttendanceLogEffects::scan`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    /// Every record in the log
    All,
    /// Records of a single tag
    Tag(TagIdentity),
}

impl RecordFilter {
    /// Whether `record` passes this filter
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::Tag(uid) => record.uid == *uid,
        }
    }
}

/// Exclusive right to run one check-append sequence against a log; released on drop
pub struct WriterLease {
    guard: Option<Box<dyn Send + Sync>>,
    log_changed: bool,
}

impl WriterLease {
    /// Lease for a log only this process writes; holds nothing
    pub fn unshared() -> Self {
        Self {
            guard: None,
            log_changed: false,
        }
    }

    /// Lease holding `guard` until dropped
    ///
    /// `log_changed` reports that the log may have been written by someone else since this
    /// handle's previous lease, so anything derived from earlier scans is stale.
    pub fn held(guard: impl Send + Sync + 'static, log_changed: bool) -> Self {
        Self {
            guard: Some(Box::new(guard)),
            log_changed,
        }
    }

    /// Whether another writer may have touched the log since the previous lease
    pub fn log_changed(&self) -> bool {
        self.log_changed
    }
}

impl fmt::Debug for WriterLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterLease")
            .field("held", &self.guard.is_some())
            .field("log_changed", &self.log_changed)
            .finish()
    }
}

/// Durable append-only store of attendance records
///
/// Implementations must make a record durable before `append` returns and must return
/// records from `scan` in append order.
#[async_trait]
pub trait AttendanceLogEffects: Send + Sync {
    /// Durably append `record`, returning its identifier
    async fn append(&self, record: AttendanceRecord) -> Result<RecordId, LogError>;

    /// Return every record matching `filter`, in append order
    async fn scan(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, LogError>;

    /// Take the writer lease, waiting at most `wait`
    ///
    /// Logs written by a single process need no lease; the default returns one immediately.
    /// Shared logs must fail with [`LogError::WriterBusy`] when the wait runs out.
    async fn acquire_writer(&self, wait: Duration) -> Result<WriterLease, LogError> {
        let _ = wait;
        Ok(WriterLease::unshared())
    }
}

#[async_trait]
impl<T: AttendanceLogEffects + ?Sized> AttendanceLogEffects for Arc<T> {
    async fn append(&self, record: AttendanceRecord) -> Result<RecordId, LogError> {
        (**self).append(record).await
    }

    async fn scan(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, LogError> {
        (**self).scan(filter).await
    }

    async fn acquire_writer(&self, wait: Duration) -> Result<WriterLease, LogError> {
        (**self).acquire_writer(wait).await
    }
}
