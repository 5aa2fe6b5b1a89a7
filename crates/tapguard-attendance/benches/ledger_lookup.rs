//! Ledger lookup benchmarks
//!
//! Compares a cache hit against the cold path that scans the attendance log, across log
//! sizes, and measures one full admission on a warm ledger.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tapguard_attendance::{AttendanceAuthenticator, TapCounterLedger, TapRequest};
use tapguard_core::{ScanFailurePolicy, TagIdentity};
use tapguard_effects::MemoryAttendanceLog;
use tapguard_testkit::{counter, record, test_config, FixedClock, TapPayloadBuilder};
use tokio::runtime::Runtime;

fn tag(n: u32) -> TagIdentity {
    let [_, a, b, c] = n.to_be_bytes();
    TagIdentity::from_bytes([0x04, 0, 0, 0, a, b, c])
}

fn populated_log(rows: u32) -> MemoryAttendanceLog {
    MemoryAttendanceLog::with_records((0..rows).map(|n| record(&tag(n % 256), n)))
}

fn bench_lookup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("ledger_lookup");

    for rows in [1_000u32, 10_000, 50_000] {
        let ledger = TapCounterLedger::new(populated_log(rows), ScanFailurePolicy::FailClosed);
        let target = tag(7);

        group.bench_with_input(BenchmarkId::new("cold_scan", rows), &rows, |b, _| {
            b.iter(|| {
                ledger.invalidate(&target);
                rt.block_on(ledger.last_counter(black_box(&target))).unwrap()
            });
        });

        rt.block_on(ledger.last_counter(&target)).unwrap();
        group.bench_with_input(BenchmarkId::new("cache_hit", rows), &rows, |b, _| {
            b.iter(|| rt.block_on(ledger.last_counter(black_box(&target))).unwrap());
        });
    }

    group.finish();
}

fn bench_admission(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let auth = AttendanceAuthenticator::from_config(
        &test_config(),
        MemoryAttendanceLog::new(),
        FixedClock::default(),
    );
    let uid = tag(1);
    let mut next = 0u32;

    c.bench_function("admit_fresh_tap", |b| {
        b.iter_batched(
            || {
                next += 1;
                let built = TapPayloadBuilder::new(uid.clone(), counter(next)).build();
                TapRequest::new(built.data, None)
            },
            |request| rt.block_on(auth.authenticate(&request)),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_lookup, bench_admission);
criterion_main!(benches);
