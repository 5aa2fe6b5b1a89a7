//! Property tests for the ledger and admission invariants

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use std::collections::HashMap;
use tapguard_attendance::{AttendanceAuthenticator, RejectReason, TapCounterLedger, TapRequest};
use tapguard_core::{HighWaterMark, ScanFailurePolicy, TagIdentity, TapCounter};
use tapguard_effects::MemoryAttendanceLog;
use tapguard_testkit::strategies::{
    arb_counter, arb_small_counter, arb_uid, arb_uid_from_pool,
};
use tapguard_testkit::{test_config, FixedClock, TapPayloadBuilder};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn request(uid: &TagIdentity, counter: TapCounter) -> TapRequest {
    let built = TapPayloadBuilder::new(uid.clone(), counter).build();
    TapRequest::new(built.data, built.cmac)
}

fn tap_sequence() -> impl Strategy<Value = Vec<(TagIdentity, TapCounter)>> {
    prop::collection::vec((arb_uid_from_pool(4), arb_small_counter()), 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Admitted counters per tag are strictly increasing, and every decision matches a
    /// reference model that only tracks the per-tag maximum.
    #[test]
    fn admitted_counters_strictly_increase(taps in tap_sequence()) {
        runtime().block_on(async {
            let log = MemoryAttendanceLog::new();
            let auth = AttendanceAuthenticator::from_config(
                &test_config(),
                log.clone(),
                FixedClock::default(),
            );
            let mut model: HashMap<TagIdentity, TapCounter> = HashMap::new();

            for (uid, counter) in &taps {
                let decision = auth.authenticate(&request(uid, *counter)).await;
                let expected = model.get(uid).map_or(true, |last| counter > last);
                prop_assert_eq!(decision.accepted(), expected);
                if expected {
                    model.insert(uid.clone(), *counter);
                } else {
                    let is_replay =
                        matches!(decision.reason(), Some(RejectReason::ReplayDetected { .. }));
                    prop_assert!(is_replay);
                }
            }

            let mut per_tag: HashMap<TagIdentity, Vec<TapCounter>> = HashMap::new();
            for row in log.records() {
                per_tag.entry(row.uid).or_default().push(row.counter);
            }
            for counters in per_tag.values() {
                prop_assert!(counters.windows(2).all(|w| w[0] < w[1]));
            }
            Ok(())
        })?;
    }

    /// An accepted (uid, counter) pair is rejected on replay no matter how many other tags
    /// were processed in between.
    #[test]
    fn replays_are_rejected_after_interleaving(
        first in arb_small_counter(),
        others in prop::collection::vec((arb_uid_from_pool(8), arb_small_counter()), 0..30),
    ) {
        runtime().block_on(async {
            let auth = AttendanceAuthenticator::from_config(
                &test_config(),
                MemoryAttendanceLog::new(),
                FixedClock::default(),
            );
            let target = TagIdentity::from_bytes([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x11, 0x22]);

            prop_assert!(auth.authenticate(&request(&target, first)).await.accepted());
            for (uid, counter) in &others {
                auth.authenticate(&request(uid, *counter)).await;
            }
            // Clearing the cache forces the replay check through the log
            auth.ledger().clear_cache();
            prop_assert!(!auth.authenticate(&request(&target, first)).await.accepted());
            Ok(())
        })?;
    }

    /// Clearing the cache and rescanning yields the value the cache held, for every tag.
    #[test]
    fn cache_matches_a_fresh_scan(taps in tap_sequence()) {
        runtime().block_on(async {
            let auth = AttendanceAuthenticator::from_config(
                &test_config(),
                MemoryAttendanceLog::new(),
                FixedClock::default(),
            );
            let mut seen = Vec::new();
            for (uid, counter) in &taps {
                if auth.authenticate(&request(uid, *counter)).await.accepted() {
                    seen.push(uid.clone());
                }
            }

            let before: Vec<Option<TapCounter>> =
                seen.iter().map(|uid| auth.ledger().cached(uid)).collect();
            auth.ledger().clear_cache();
            for (uid, cached) in seen.iter().zip(before) {
                let rescanned = auth.ledger().last_counter(uid).await.unwrap();
                prop_assert_eq!(rescanned.counter(), cached);
            }
            Ok(())
        })?;
    }

    /// Advancing with a non-increasing counter after a higher one changes nothing.
    #[test]
    fn advance_is_idempotent(uid in arb_uid(), high in arb_counter(), lower in arb_counter()) {
        let lower = lower.min(high);
        let ledger =
            TapCounterLedger::new(MemoryAttendanceLog::new(), ScanFailurePolicy::FailClosed);

        ledger.advance(&uid, high);
        ledger.advance(&uid, high);
        ledger.advance(&uid, lower);
        prop_assert_eq!(ledger.cached(&uid), Some(high));

        let mark = runtime().block_on(ledger.last_counter(&uid)).unwrap();
        prop_assert_eq!(mark, HighWaterMark::At(high));
    }
}
