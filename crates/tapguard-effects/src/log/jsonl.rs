//! JSON-lines attendance log
//!
//! Each row is one JSON array on its own line, columns in a fixed order:
//!
//! ```text
//! ["6f0c...-uuid", "AABBCCDDEE1122", 7, "2026-03-01T09:15:02.113Z", "94EED9EE65337086"]
//! ```
//!
//! The file is only ever opened for append. A missing file is an empty log.
//!
//! # Sharing between processes
//!
//! Every process that admits taps against the same file takes the writer lease: an exclusive
//! advisory lock on the `<log>.lock` sidecar. Each handle remembers the file length it last
//! knew; a lease taken after someone else grew the file reports `log_changed`.
//!
//! # Incomplete rows
//!
//! A crash during an append can leave a final line without its newline. When that line does
//! not parse, scans skip it and the next append truncates it away. An unparsable line
//! anywhere else is [`LogError::Corrupt`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tapguard_core::{
    AttendanceLogEffects, AttendanceRecord, LogError, RecordFilter, RecordId, TagIdentity,
    TapCounter, WriterLease,
};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Pause between attempts to take a contended writer lease
const LEASE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// On-disk column order: record id, uid, counter, timestamp, auth tag
#[derive(Debug, Serialize, Deserialize)]
struct LogRow(RecordId, TagIdentity, TapCounter, DateTime<Utc>, String);

impl From<&AttendanceRecord> for LogRow {
    fn from(record: &AttendanceRecord) -> Self {
        LogRow(
            record.record_id,
            record.uid.clone(),
            record.counter,
            record.recorded_at,
            record.auth_tag.clone(),
        )
    }
}

impl From<LogRow> for AttendanceRecord {
    fn from(LogRow(record_id, uid, counter, recorded_at, auth_tag): LogRow) -> Self {
        AttendanceRecord {
            record_id,
            uid,
            counter,
            recorded_at,
            auth_tag,
        }
    }
}

fn io_failure(action: &str, path: &Path, e: std::io::Error) -> LogError {
    LogError::unavailable(format!("{action} {}: {e}", path.display()))
}

/// Exclusive lock on the sidecar file; unlocked on drop
#[derive(Debug)]
struct SidecarLock {
    file: std::fs::File,
}

impl Drop for SidecarLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Attendance log stored as an append-only JSON-lines file
#[derive(Debug)]
pub struct JsonlAttendanceLog {
    path: PathBuf,
    lock_path: PathBuf,
    write_lock: Mutex<()>,
    /// File length as of this handle's last lease or own append
    known_len: parking_lot::Mutex<Option<u64>>,
}

impl JsonlAttendanceLog {
    /// Open the log at `path`; the file is created on first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = OsString::from(path.as_os_str());
        lock_path.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_path),
            write_lock: Mutex::new(()),
            known_len: parking_lot::Mutex::new(None),
        }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the writer lease sidecar
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn current_len(&self) -> Result<u64, LogError> {
        match fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(io_failure("stat", &self.path, e)),
        }
    }

    async fn read_rows(&self) -> Result<Vec<AttendanceRecord>, LogError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_failure("read", &self.path, e)),
        };
        // Only an incomplete final row can hold a split character
        let text = String::from_utf8_lossy(&bytes);
        let terminated = text.ends_with('\n');
        let lines: Vec<&str> = text.lines().collect();

        let mut rows = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogRow>(line) {
                Ok(row) => rows.push(AttendanceRecord::from(row)),
                Err(e) if !terminated && index + 1 == lines.len() => {
                    warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping incomplete trailing attendance row"
                    );
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "Corrupt attendance row"
                    );
                    return Err(LogError::corrupt(index + 1, e.to_string()));
                }
            }
        }
        Ok(rows)
    }

    /// Make the file end on a row boundary before appending to it
    ///
    /// An unterminated final row that parses gets its newline; one that does not is cut off.
    async fn repair_tail(&self) -> Result<(), LogError> {
        let mut file = match OpenOptions::new().read(true).write(true).open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_failure("open", &self.path, e)),
        };
        let len = file
            .metadata()
            .await
            .map_err(|e| io_failure("stat", &self.path, e))?
            .len();
        if len == 0 {
            return Ok(());
        }

        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .await
            .map_err(|e| io_failure("seek", &self.path, e))?;
        file.read_exact(&mut last)
            .await
            .map_err(|e| io_failure("read", &self.path, e))?;
        if last[0] == b'\n' {
            return Ok(());
        }

        let bytes = fs::read(&self.path)
            .await
            .map_err(|e| io_failure("read", &self.path, e))?;
        let row_start = bytes
            .iter()
            .rposition(|byte| *byte == b'\n')
            .map_or(0, |newline| newline + 1);

        if serde_json::from_slice::<LogRow>(&bytes[row_start..]).is_ok() {
            file.seek(SeekFrom::End(0))
                .await
                .map_err(|e| io_failure("seek", &self.path, e))?;
            file.write_all(b"\n")
                .await
                .map_err(|e| io_failure("write", &self.path, e))?;
            debug!(path = %self.path.display(), "Terminated trailing attendance row");
        } else {
            file.set_len(row_start as u64)
                .await
                .map_err(|e| io_failure("truncate", &self.path, e))?;
            warn!(
                path = %self.path.display(),
                dropped_bytes = bytes.len() - row_start,
                "Truncated incomplete trailing attendance row"
            );
        }
        file.sync_data()
            .await
            .map_err(|e| io_failure("sync", &self.path, e))
    }
}

#[async_trait]
impl AttendanceLogEffects for JsonlAttendanceLog {
    async fn append(&self, record: AttendanceRecord) -> Result<RecordId, LogError> {
        let mut line = serde_json::to_string(&LogRow::from(&record))
            .map_err(|e| LogError::unavailable(format!("encode row: {e}")))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        self.repair_tail().await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| io_failure("open", &self.path, e))?;
        let before = file
            .metadata()
            .await
            .map_err(|e| io_failure("stat", &self.path, e))?
            .len();

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| io_failure("write", &self.path, e))?;
        file.flush()
            .await
            .map_err(|e| io_failure("flush", &self.path, e))?;
        file.sync_data()
            .await
            .map_err(|e| io_failure("sync", &self.path, e))?;

        // Our own row never makes cached marks stale; anyone else's growth still does
        {
            let mut known = self.known_len.lock();
            if *known == Some(before) {
                *known = Some(before + line.len() as u64);
            }
        }

        debug!(
            record_id = %record.record_id,
            uid = %record.uid,
            counter = %record.counter,
            "Appended attendance row"
        );
        Ok(record.record_id)
    }

    async fn scan(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, LogError> {
        let rows = self.read_rows().await?;
        Ok(rows.into_iter().filter(|row| filter.matches(row)).collect())
    }

    async fn acquire_writer(&self, wait: Duration) -> Result<WriterLease, LogError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .await
            .map_err(|e| io_failure("open", &self.lock_path, e))?
            .into_std()
            .await;

        let deadline = Instant::now() + wait;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => break,
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        warn!(
                            path = %self.lock_path.display(),
                            waited = ?wait,
                            "Attendance log writer lease busy"
                        );
                        return Err(LogError::WriterBusy { waited: wait });
                    }
                    tokio::time::sleep(LEASE_POLL_INTERVAL).await;
                }
                Err(e) => return Err(io_failure("lock", &self.lock_path, e)),
            }
        }
        let lock = SidecarLock { file };

        let len = self.current_len().await?;
        let log_changed = {
            let mut known = self.known_len.lock();
            let changed = *known != Some(len);
            *known = Some(len);
            changed
        };
        if log_changed {
            debug!(path = %self.path.display(), len, "Attendance log changed since last lease");
        }
        Ok(WriterLease::held(lock, log_changed))
    }
}
