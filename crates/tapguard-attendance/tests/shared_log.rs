//! Several authenticators, each with its own handle on one JSON-lines log, standing in for
//! separate processes admitting taps against the same file

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tapguard_attendance::{AttendanceAuthenticator, RejectReason, TapRequest};
use tapguard_core::{AttendanceLogEffects, RecordFilter, TapGuardConfig};
use tapguard_effects::{JsonlAttendanceLog, SystemClock};
use tapguard_testkit::{counter, test_config, uid, TapPayloadBuilder};

const TAG: &str = "AABBCCDDEE1122";

type FileAuthenticator = AttendanceAuthenticator<JsonlAttendanceLog, SystemClock>;

fn tap(value: u32) -> TapRequest {
    let built = TapPayloadBuilder::new(uid(TAG), counter(value)).build();
    TapRequest::new(built.data, built.cmac)
}

fn open(config: &TapGuardConfig, path: &Path) -> Arc<FileAuthenticator> {
    Arc::new(AttendanceAuthenticator::from_config(
        config,
        JsonlAttendanceLog::new(path),
        SystemClock::new(),
    ))
}

async fn stored_counters(path: &Path) -> Vec<u32> {
    JsonlAttendanceLog::new(path)
        .scan(&RecordFilter::All)
        .await
        .unwrap()
        .iter()
        .map(|row| row.counter.value())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn the_same_tap_through_two_handles_is_admitted_once() {
    for _ in 0..20 {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.jsonl");
        let first = open(&test_config(), &path);
        let second = open(&test_config(), &path);

        let a = tokio::spawn({
            let auth = Arc::clone(&first);
            async move { auth.authenticate(&tap(5)).await }
        });
        let b = tokio::spawn({
            let auth = Arc::clone(&second);
            async move { auth.authenticate(&tap(5)).await }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert!(a.accepted() != b.accepted());
        let loser = if a.accepted() { b } else { a };
        assert_matches!(
            loser.reason(),
            Some(RejectReason::ReplayDetected { last }) if *last == counter(5)
        );
        assert_eq!(stored_counters(&path).await, vec![5]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_counters_through_two_handles_stay_increasing() {
    for _ in 0..20 {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.jsonl");
        let first = open(&test_config(), &path);
        let second = open(&test_config(), &path);

        let five = tokio::spawn({
            let auth = Arc::clone(&first);
            async move { auth.authenticate(&tap(5)).await }
        });
        let six = tokio::spawn({
            let auth = Arc::clone(&second);
            async move { auth.authenticate(&tap(6)).await }
        });
        let (five, six) = (five.await.unwrap(), six.await.unwrap());

        assert!(six.accepted());
        let stored = stored_counters(&path).await;
        if five.accepted() {
            assert_eq!(stored, vec![5, 6]);
        } else {
            assert_eq!(stored, vec![6]);
        }
    }
}

#[tokio::test]
async fn a_cached_mark_does_not_outlive_another_writer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("attendance.jsonl");
    let first = open(&test_config(), &path);
    let second = open(&test_config(), &path);

    assert!(first.authenticate(&tap(5)).await.accepted());
    assert_eq!(first.ledger().cached(&uid(TAG)), Some(counter(5)));
    assert!(second.authenticate(&tap(6)).await.accepted());

    assert_matches!(
        first.authenticate(&tap(6)).await.reason(),
        Some(RejectReason::ReplayDetected { last }) if *last == counter(6)
    );
    assert!(first.authenticate(&tap(7)).await.accepted());
    assert_eq!(stored_counters(&path).await, vec![5, 6, 7]);
}

#[tokio::test]
async fn a_lease_held_elsewhere_reports_server_busy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("attendance.jsonl");
    let mut config = test_config();
    config.locks.wait_ms = 50;
    let auth = open(&config, &path);

    let holder = JsonlAttendanceLog::new(&path);
    let lease = holder.acquire_writer(Duration::from_secs(1)).await.unwrap();

    let busy = auth.authenticate(&tap(1)).await;
    assert_matches!(busy.reason(), Some(RejectReason::ServerBusy));
    assert!(stored_counters(&path).await.is_empty());

    drop(lease);
    assert!(auth.authenticate(&tap(1)).await.accepted());
}
