//! Tap counter ledger
//!
//! Answers "what is the highest counter ever accepted for this tag?" through a two-tier read
//! path:
//!
//! 1. **Cache**: an in-process map from tag to high-water mark. A hit returns immediately.
//! 2. **Scan**: on a miss, the attendance log is scanned for the tag and reduced to its
//!    maximum counter. A tag with history is written back into the cache.
//!
//! The log is the only source of truth. The cache can be cleared or rebuilt at any moment
//! without losing information, and every cache write is a max-merge so a stale writer can
//! never lower a mark.
//!
//! # Scan failures
//!
//! When the log cannot be scanned the configured [`ScanFailurePolicy`] decides the answer.
//! `FailClosed` reports [`LedgerError::ScanFailed`] and the tap is rejected. `FailOpen` answers
//! `Unseen`, which admits a replay for any tag not already cached while the log is down.
//!
//! # Other writers
//!
//! A cached mark is only trusted while this process is the log's sole writer. Every admission
//! goes through [`TapCounterLedger::acquire_writer`]; when the lease reports that another
//! writer grew the log, the whole cache is dropped and marks are rebuilt from scans.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tapguard_core::{
    AttendanceLogEffects, AttendanceRecord, HighWaterMark, LogError, RecordFilter,
    ScanFailurePolicy, TagIdentity, TapCounter, WriterLease,
};
use tracing::{debug, warn};

/// Errors surfaced by ledger reads
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The attendance log could not be scanned
    #[error("attendance log scan failed: {0}")]
    ScanFailed(#[source] LogError),

    /// The log's writer lease could not be taken
    #[error("attendance log writer lease failed: {0}")]
    LeaseFailed(#[source] LogError),
}

/// Point-in-time ledger counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    /// Lookups answered from the cache
    pub cache_hits: u64,
    /// Lookups that fell through to a scan
    pub cache_misses: u64,
    /// Log scans performed, including rebuilds
    pub scans: u64,
    /// Log scans that failed
    pub scan_failures: u64,
    /// Tags currently cached
    pub cached_tags: usize,
}

#[derive(Debug, Default)]
struct StatCounters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    scans: AtomicU64,
    scan_failures: AtomicU64,
}

/// Per-tag high-water marks backed by the attendance log
#[derive(Debug)]
pub struct TapCounterLedger<L> {
    log: L,
    cache: RwLock<HashMap<TagIdentity, TapCounter>>,
    policy: ScanFailurePolicy,
    stats: StatCounters,
}

impl<L: AttendanceLogEffects> TapCounterLedger<L> {
    /// Create a ledger over `log` with an empty cache
    pub fn new(log: L, policy: ScanFailurePolicy) -> Self {
        Self {
            log,
            cache: RwLock::new(HashMap::new()),
            policy,
            stats: StatCounters::default(),
        }
    }

    /// The underlying attendance log
    pub fn log(&self) -> &L {
        &self.log
    }

    /// Scan failure policy in force
    pub fn policy(&self) -> ScanFailurePolicy {
        self.policy
    }

    /// Highest counter accepted for `uid`, or `Unseen`
    pub async fn last_counter(&self, uid: &TagIdentity) -> Result<HighWaterMark, LedgerError> {
        if let Some(counter) = self.cached(uid) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(uid = %uid, last = %counter, "Ledger cache hit");
            return Ok(HighWaterMark::At(counter));
        }
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        match self.scan_tag(uid).await {
            Ok(mark) => {
                let mark = match mark {
                    HighWaterMark::At(counter) => HighWaterMark::At(self.merge(uid, counter)),
                    HighWaterMark::Unseen => HighWaterMark::Unseen,
                };
                debug!(uid = %uid, last = %mark, "Ledger scan complete");
                Ok(mark)
            }
            Err(e) => match self.policy {
                ScanFailurePolicy::FailClosed => Err(LedgerError::ScanFailed(e)),
                ScanFailurePolicy::FailOpen => {
                    warn!(
                        uid = %uid,
                        error = %e,
                        "Attendance log unavailable; treating tag as unseen (fail-open)"
                    );
                    Ok(HighWaterMark::Unseen)
                }
            },
        }
    }

    /// Take the log's writer lease for one admission
    ///
    /// Drops every cached mark when the lease reports that another writer changed the log.
    pub async fn acquire_writer(&self, wait: Duration) -> Result<WriterLease, LogError> {
        let lease = self.log.acquire_writer(wait).await?;
        if lease.log_changed() {
            let dropped = {
                let mut cache = self.cache.write();
                let dropped = cache.len();
                cache.clear();
                dropped
            };
            if dropped > 0 {
                debug!(dropped, "Attendance log changed by another writer; cache cleared");
            }
        }
        Ok(lease)
    }

    /// Record `counter` as accepted for `uid`
    ///
    /// Call only after the matching record has been durably appended. A counter at or below
    /// the current mark is a no-op.
    pub fn advance(&self, uid: &TagIdentity, counter: TapCounter) {
        let mark = self.merge(uid, counter);
        debug!(uid = %uid, counter = counter.value(), mark = mark.value(), "Ledger advanced");
    }

    /// Cached mark for `uid`, without touching the log
    pub fn cached(&self, uid: &TagIdentity) -> Option<TapCounter> {
        self.cache.read().get(uid).copied()
    }

    /// Drop the cached mark for `uid`; the next lookup rescans
    pub fn invalidate(&self, uid: &TagIdentity) {
        self.cache.write().remove(uid);
    }

    /// Drop every cached mark
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// Rescan the whole log and merge every tag's maximum counter into the cache
    ///
    /// Returns the resulting marks for every tag with history.
    pub async fn rebuild(&self) -> Result<BTreeMap<TagIdentity, TapCounter>, LedgerError> {
        self.stats.scans.fetch_add(1, Ordering::Relaxed);
        let records = self.log.scan(&RecordFilter::All).await.map_err(|e| {
            self.stats.scan_failures.fetch_add(1, Ordering::Relaxed);
            LedgerError::ScanFailed(e)
        })?;

        let mut marks: BTreeMap<TagIdentity, TapCounter> = BTreeMap::new();
        for record in records {
            marks
                .entry(record.uid)
                .and_modify(|last| *last = (*last).max(record.counter))
                .or_insert(record.counter);
        }

        let mut cache = self.cache.write();
        for (uid, counter) in marks.iter_mut() {
            let slot = cache.entry(uid.clone()).or_insert(*counter);
            *slot = (*slot).max(*counter);
            *counter = *slot;
        }
        debug!(tags = marks.len(), "Ledger rebuilt from attendance log");
        Ok(marks)
    }

    /// Every record for `uid`, ordered by counter
    pub async fn history(&self, uid: &TagIdentity) -> Result<Vec<AttendanceRecord>, LedgerError> {
        self.stats.scans.fetch_add(1, Ordering::Relaxed);
        let mut records = self
            .log
            .scan(&RecordFilter::Tag(uid.clone()))
            .await
            .map_err(|e| {
                self.stats.scan_failures.fetch_add(1, Ordering::Relaxed);
                LedgerError::ScanFailed(e)
            })?;
        records.sort_by_key(|record| record.counter);
        Ok(records)
    }

    /// Snapshot of the ledger counters
    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.stats.cache_misses.load(Ordering::Relaxed),
            scans: self.stats.scans.load(Ordering::Relaxed),
            scan_failures: self.stats.scan_failures.load(Ordering::Relaxed),
            cached_tags: self.cache.read().len(),
        }
    }

    async fn scan_tag(&self, uid: &TagIdentity) -> Result<HighWaterMark, LogError> {
        self.stats.scans.fetch_add(1, Ordering::Relaxed);
        let records = self
            .log
            .scan(&RecordFilter::Tag(uid.clone()))
            .await
            .map_err(|e| {
                self.stats.scan_failures.fetch_add(1, Ordering::Relaxed);
                e
            })?;

        Ok(records
            .iter()
            .filter(|record| record.uid == *uid)
            .fold(HighWaterMark::Unseen, |mark, record| {
                mark.max_with(record.counter)
            }))
    }

    /// Max-merge `counter` into the cache, returning the mark now held
    fn merge(&self, uid: &TagIdentity, counter: TapCounter) -> TapCounter {
        let mut cache = self.cache.write();
        let slot = cache.entry(uid.clone()).or_insert(counter);
        *slot = (*slot).max(counter);
        *slot
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tapguard_effects::MemoryAttendanceLog;
    use tapguard_testkit::{counter, uid, FailingAttendanceLog};

    #[tokio::test]
    async fn unseen_tags_are_not_cached() {
        let ledger =
            TapCounterLedger::new(MemoryAttendanceLog::new(), ScanFailurePolicy::FailClosed);
        let tag = uid("AABBCCDDEE1122");

        assert_eq!(ledger.last_counter(&tag).await.unwrap(), HighWaterMark::Unseen);
        assert_eq!(ledger.cached(&tag), None);
        assert_eq!(ledger.last_counter(&tag).await.unwrap(), HighWaterMark::Unseen);
        assert_eq!(ledger.stats().scans, 2);
    }

    #[tokio::test]
    async fn miss_scans_once_then_hits() {
        let tag = uid("AABBCCDDEE1122");
        let log = MemoryAttendanceLog::with_records([
            tapguard_testkit::record(&tag, 3),
            tapguard_testkit::record(&tag, 9),
            tapguard_testkit::record(&tag, 4),
            tapguard_testkit::record(&uid("00000000000001"), 50),
        ]);
        let ledger = TapCounterLedger::new(log, ScanFailurePolicy::FailClosed);

        assert_eq!(ledger.last_counter(&tag).await.unwrap(), HighWaterMark::At(counter(9)));
        assert_eq!(ledger.last_counter(&tag).await.unwrap(), HighWaterMark::At(counter(9)));

        let stats = ledger.stats();
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.scans, 1);
        assert_eq!(stats.cached_tags, 1);
    }

    #[tokio::test]
    async fn advance_never_lowers_the_mark() {
        let ledger =
            TapCounterLedger::new(MemoryAttendanceLog::new(), ScanFailurePolicy::FailClosed);
        let tag = uid("AABBCCDDEE1122");

        ledger.advance(&tag, counter(7));
        ledger.advance(&tag, counter(7));
        ledger.advance(&tag, counter(2));
        assert_eq!(ledger.cached(&tag), Some(counter(7)));

        ledger.advance(&tag, counter(8));
        assert_eq!(ledger.cached(&tag), Some(counter(8)));
    }

    #[tokio::test]
    async fn invalidate_forces_a_rescan() {
        let tag = uid("AABBCCDDEE1122");
        let log = MemoryAttendanceLog::with_records([tapguard_testkit::record(&tag, 5)]);
        let ledger = TapCounterLedger::new(log, ScanFailurePolicy::FailClosed);

        ledger.advance(&tag, counter(5));
        ledger.invalidate(&tag);
        assert_eq!(ledger.cached(&tag), None);
        assert_eq!(ledger.last_counter(&tag).await.unwrap(), HighWaterMark::At(counter(5)));
        assert_eq!(ledger.stats().scans, 1);
    }

    #[tokio::test]
    async fn fail_closed_reports_scan_failure() {
        let ledger =
            TapCounterLedger::new(FailingAttendanceLog::new(), ScanFailurePolicy::FailClosed);
        assert_matches!(
            ledger.last_counter(&uid("AABBCCDDEE1122")).await,
            Err(LedgerError::ScanFailed(LogError::Unavailable { .. }))
        );
        assert_eq!(ledger.stats().scan_failures, 1);
    }

    #[tokio::test]
    async fn fail_open_answers_unseen_but_keeps_cached_marks() {
        let ledger =
            TapCounterLedger::new(FailingAttendanceLog::new(), ScanFailurePolicy::FailOpen);
        let cached = uid("AABBCCDDEE1122");
        ledger.advance(&cached, counter(4));

        assert_eq!(
            ledger.last_counter(&uid("00000000000001")).await.unwrap(),
            HighWaterMark::Unseen
        );
        assert_eq!(ledger.last_counter(&cached).await.unwrap(), HighWaterMark::At(counter(4)));
    }

    #[tokio::test]
    async fn rebuild_merges_without_lowering() {
        let a = uid("AABBCCDDEE1122");
        let b = uid("00000000000001");
        let log = MemoryAttendanceLog::with_records([
            tapguard_testkit::record(&a, 2),
            tapguard_testkit::record(&b, 11),
            tapguard_testkit::record(&a, 6),
        ]);
        let ledger = TapCounterLedger::new(log, ScanFailurePolicy::FailClosed);
        // A cached mark above the log (append landed, scan not yet visible) survives
        ledger.advance(&b, counter(12));

        let marks = ledger.rebuild().await.unwrap();
        assert_eq!(marks.get(&a), Some(&counter(6)));
        assert_eq!(marks.get(&b), Some(&counter(12)));
        assert_eq!(ledger.cached(&a), Some(counter(6)));
    }

    #[tokio::test]
    async fn history_is_ordered_by_counter() {
        let tag = uid("AABBCCDDEE1122");
        let log = MemoryAttendanceLog::with_records([
            tapguard_testkit::record(&tag, 9),
            tapguard_testkit::record(&tag, 1),
            tapguard_testkit::record(&uid("00000000000001"), 3),
            tapguard_testkit::record(&tag, 4),
        ]);
        let ledger = TapCounterLedger::new(log, ScanFailurePolicy::FailClosed);

        let counters: Vec<u32> = ledger
            .history(&tag)
            .await
            .unwrap()
            .iter()
            .map(|r| r.counter.value())
            .collect();
        assert_eq!(counters, vec![1, 4, 9]);
    }

    #[tokio::test]
    async fn foreign_append_drops_cached_marks_at_the_next_lease() {
        use tapguard_effects::JsonlAttendanceLog;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.jsonl");
        let tag = uid("AABBCCDDEE1122");
        let wait = std::time::Duration::from_secs(1);
        let ledger =
            TapCounterLedger::new(JsonlAttendanceLog::new(&path), ScanFailurePolicy::FailClosed);

        let lease = ledger.acquire_writer(wait).await.unwrap();
        ledger.log().append(tapguard_testkit::record(&tag, 5)).await.unwrap();
        ledger.advance(&tag, counter(5));
        drop(lease);

        // Our own append leaves the cache trusted
        drop(ledger.acquire_writer(wait).await.unwrap());
        assert_eq!(ledger.cached(&tag), Some(counter(5)));

        JsonlAttendanceLog::new(&path)
            .append(tapguard_testkit::record(&tag, 6))
            .await
            .unwrap();
        let _lease = ledger.acquire_writer(wait).await.unwrap();
        assert_eq!(ledger.cached(&tag), None);
        assert_eq!(ledger.last_counter(&tag).await.unwrap(), HighWaterMark::At(counter(6)));
    }
}
