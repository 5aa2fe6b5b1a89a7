//! Attendance logs that fail or stall on demand

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tapguard_core::{AttendanceLogEffects, AttendanceRecord, LogError, RecordFilter, RecordId};
use tapguard_effects::MemoryAttendanceLog;

/// Log whose every operation reports `Unavailable`
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingAttendanceLog;

impl FailingAttendanceLog {
    /// Create the log
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AttendanceLogEffects for FailingAttendanceLog {
    async fn append(&self, _record: AttendanceRecord) -> Result<RecordId, LogError> {
        Err(LogError::unavailable("injected append failure"))
    }

    async fn scan(&self, _filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, LogError> {
        Err(LogError::unavailable("injected scan failure"))
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_scans: AtomicBool,
    fail_appends: AtomicBool,
    append_delay: Mutex<Option<Duration>>,
    scans: AtomicU64,
    appends: AtomicU64,
}

/// In-memory log with switchable faults and operation counters
///
/// Clones share rows, faults and counters.
#[derive(Debug, Clone, Default)]
pub struct FlakyAttendanceLog {
    inner: MemoryAttendanceLog,
    faults: Arc<Faults>,
}

impl FlakyAttendanceLog {
    /// Create an empty, healthy log
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing rows
    pub fn with_records(records: impl IntoIterator<Item = AttendanceRecord>) -> Self {
        Self {
            inner: MemoryAttendanceLog::with_records(records),
            faults: Arc::default(),
        }
    }

    /// Make scans fail or succeed
    pub fn fail_scans(&self, fail: bool) {
        self.faults.fail_scans.store(fail, Ordering::SeqCst);
    }

    /// Make appends fail or succeed
    pub fn fail_appends(&self, fail: bool) {
        self.faults.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Stall every append for `delay` before it lands
    pub fn delay_appends(&self, delay: Option<Duration>) {
        *self.faults.append_delay.lock() = delay;
    }

    /// Scans attempted so far, failed ones included
    pub fn scan_count(&self) -> u64 {
        self.faults.scans.load(Ordering::SeqCst)
    }

    /// Appends attempted so far, failed ones included
    pub fn append_count(&self) -> u64 {
        self.faults.appends.load(Ordering::SeqCst)
    }

    /// Rows that actually landed
    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.inner.records()
    }
}

#[async_trait]
impl AttendanceLogEffects for FlakyAttendanceLog {
    async fn append(&self, record: AttendanceRecord) -> Result<RecordId, LogError> {
        self.faults.appends.fetch_add(1, Ordering::SeqCst);
        let delay = *self.faults.append_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.faults.fail_appends.load(Ordering::SeqCst) {
            return Err(LogError::unavailable("injected append failure"));
        }
        self.inner.append(record).await
    }

    async fn scan(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, LogError> {
        self.faults.scans.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_scans.load(Ordering::SeqCst) {
            return Err(LogError::unavailable("injected scan failure"));
        }
        self.inner.scan(filter).await
    }
}
