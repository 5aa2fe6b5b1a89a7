//! In-memory attendance log for testing and one-shot tooling

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tapguard_core::{AttendanceLogEffects, AttendanceRecord, LogError, RecordFilter, RecordId};

#[derive(Debug, Default)]
struct MemoryLogState {
    rows: Vec<AttendanceRecord>,
    ids: HashSet<RecordId>,
}

/// Attendance log held in process memory
///
/// Clones share the same rows, so a test can keep a handle for inspection after moving
/// another into the authenticator.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttendanceLog {
    state: Arc<RwLock<MemoryLogState>>,
}

impl MemoryAttendanceLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log pre-populated with `records`, in order
    pub fn with_records(records: impl IntoIterator<Item = AttendanceRecord>) -> Self {
        let log = Self::new();
        {
            let mut state = log.state.write();
            for record in records {
                state.ids.insert(record.record_id);
                state.rows.push(record);
            }
        }
        log
    }

    /// Snapshot of every row, in append order
    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.state.read().rows.clone()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    /// Whether the log has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AttendanceLogEffects for MemoryAttendanceLog {
    async fn append(&self, record: AttendanceRecord) -> Result<RecordId, LogError> {
        let mut state = self.state.write();
        let record_id = record.record_id;
        if !state.ids.insert(record_id) {
            return Err(LogError::DuplicateRecord { record_id });
        }
        state.rows.push(record);
        Ok(record_id)
    }

    async fn scan(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, LogError> {
        let state = self.state.read();
        Ok(state
            .rows
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}
