//! Attendance authenticator
//!
//! Runs one tap through the admission pipeline:
//!
//! ```text
//! RECEIVED -> DECODED -> (integrity checked) -> LOCKED -> LEDGER_CHECKED
//!          -> ADMITTED -> LOGGED -> LEDGER_ADVANCED
//!          \-> REJECTED
//! ```
//!
//! Every failure becomes a terminal [`TapDecision`]; nothing propagates to the caller as an
//! error. The tag lock and the log's writer lease are both held from the ledger read through
//! the ledger advance, so two taps of one tag can never both pass the freshness check against
//! the same mark, whether they race inside one process or across processes sharing the log.

use crate::ledger::{LedgerError, TapCounterLedger};
use crate::locks::TagLocks;
use crate::request::TapRequest;
use serde::Serialize;
use tapguard_codec::{DecodeError, IntegrityError, PayloadCodec, SdmMacVerifier};
use tapguard_core::{
    AttendanceLogEffects, AttendanceRecord, LogError, RecordId, TagIdentity, TapCounter,
    TapGuardConfig, WallClockEffects,
};
use tracing::{debug, error, info, warn};

/// Why a tap was not admitted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// The payload could not be decoded
    #[error("payload decode failed: {0}")]
    DecodeFailed(#[source] DecodeError),

    /// The integrity code was missing or wrong
    #[error("integrity check failed: {0}")]
    IntegrityMismatch(#[source] IntegrityError),

    /// The tag lock or the log's writer lease was not acquired in time; the tap may be retried
    #[error("server busy")]
    ServerBusy,

    /// The counter is not above the tag's high-water mark
    #[error("replay detected: counter not above {last}")]
    ReplayDetected {
        /// Highest counter previously accepted for the tag
        last: TapCounter,
    },

    /// The ledger could not consult the attendance log
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(#[source] LedgerError),

    /// The admitted record could not be appended
    #[error("attendance record not stored: {0}")]
    RecordNotStored(#[source] LogError),
}

impl RejectReason {
    /// Whether the same tap may succeed if resubmitted
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RejectReason::ServerBusy
                | RejectReason::LedgerUnavailable(_)
                | RejectReason::RecordNotStored(_)
        )
    }

    /// Stable machine-readable name
    pub fn kind(&self) -> &'static str {
        match self {
            RejectReason::DecodeFailed(_) => "decode_failed",
            RejectReason::IntegrityMismatch(_) => "integrity_mismatch",
            RejectReason::ServerBusy => "server_busy",
            RejectReason::ReplayDetected { .. } => "replay_detected",
            RejectReason::LedgerUnavailable(_) => "ledger_unavailable",
            RejectReason::RecordNotStored(_) => "record_not_stored",
        }
    }
}

/// Terminal outcome of one tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    /// The tap was fresh and its record is durable
    Admitted {
        /// Identifier of the appended record
        record_id: RecordId,
    },
    /// The tap was refused
    Rejected(RejectReason),
}

/// Result of authenticating one tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapDecision {
    /// Decoded tag, absent when decoding failed
    pub uid: Option<TagIdentity>,
    /// Decoded counter, absent when decoding failed
    pub counter: Option<TapCounter>,
    /// What happened
    pub outcome: TapOutcome,
}

impl TapDecision {
    fn rejected(
        uid: Option<TagIdentity>,
        counter: Option<TapCounter>,
        reason: RejectReason,
    ) -> Self {
        Self {
            uid,
            counter,
            outcome: TapOutcome::Rejected(reason),
        }
    }

    /// Whether the tap was admitted
    pub fn accepted(&self) -> bool {
        matches!(self.outcome, TapOutcome::Admitted { .. })
    }

    /// Rejection reason, if any
    pub fn reason(&self) -> Option<&RejectReason> {
        match &self.outcome {
            TapOutcome::Admitted { .. } => None,
            TapOutcome::Rejected(reason) => Some(reason),
        }
    }

    /// Flat summary for machine-readable output
    pub fn summary(&self) -> DecisionSummary {
        let (record_id, reason) = match &self.outcome {
            TapOutcome::Admitted { record_id } => (Some(record_id.to_string()), None),
            TapOutcome::Rejected(reason) => (None, Some(reason.kind())),
        };
        DecisionSummary {
            accepted: self.accepted(),
            uid: self.uid.as_ref().map(|uid| uid.to_string()),
            counter: self.counter.map(TapCounter::value),
            record_id,
            reason,
        }
    }
}

/// Serializable view of a [`TapDecision`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionSummary {
    /// Whether the tap was admitted
    pub accepted: bool,
    /// Decoded tag
    pub uid: Option<String>,
    /// Decoded counter
    pub counter: Option<u32>,
    /// Appended record
    pub record_id: Option<String>,
    /// Rejection kind
    pub reason: Option<&'static str>,
}

/// Admits fresh taps exactly once
#[derive(Debug)]
pub struct AttendanceAuthenticator<L, C> {
    codec: PayloadCodec,
    verifier: Option<SdmMacVerifier>,
    ledger: TapCounterLedger<L>,
    locks: TagLocks,
    clock: C,
}

impl<L, C> AttendanceAuthenticator<L, C>
where
    L: AttendanceLogEffects,
    C: WallClockEffects,
{
    /// Assemble an authenticator from its parts
    pub fn new(
        codec: PayloadCodec,
        verifier: Option<SdmMacVerifier>,
        ledger: TapCounterLedger<L>,
        locks: TagLocks,
        clock: C,
    ) -> Self {
        Self {
            codec,
            verifier,
            ledger,
            locks,
            clock,
        }
    }

    /// Build an authenticator from a validated configuration
    pub fn from_config(config: &TapGuardConfig, log: L, clock: C) -> Self {
        Self::new(
            PayloadCodec::new(config.secret_key.clone()),
            config.sdm_mac_key.clone().map(SdmMacVerifier::new),
            TapCounterLedger::new(log, config.ledger.scan_failure),
            TagLocks::new(config.locks.scope, config.locks.wait()),
            clock,
        )
    }

    /// The ledger this authenticator advances
    pub fn ledger(&self) -> &TapCounterLedger<L> {
        &self.ledger
    }

    /// The admission locks
    pub fn locks(&self) -> &TagLocks {
        &self.locks
    }

    /// Whether taps must carry a valid integrity code
    pub fn enforces_integrity(&self) -> bool {
        self.verifier.is_some()
    }

    /// Authenticate one tap
    pub async fn authenticate(&self, request: &TapRequest) -> TapDecision {
        let payload = match self.codec.decode(&request.data) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Tap payload rejected");
                return TapDecision::rejected(None, None, RejectReason::DecodeFailed(e));
            }
        };
        let uid = payload.uid.clone();
        let counter = payload.counter;
        debug!(uid = %uid, counter = counter.value(), "Tap payload decoded");

        if let Some(verifier) = &self.verifier {
            if let Err(e) = verifier.verify(&payload, request.auth_tag()) {
                warn!(
                    uid = %uid,
                    counter = counter.value(),
                    error = %e,
                    "Integrity check failed"
                );
                return TapDecision::rejected(
                    Some(uid),
                    Some(counter),
                    RejectReason::IntegrityMismatch(e),
                );
            }
        }

        let _lock = match self.locks.acquire(&uid).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(
                    uid = %uid,
                    counter = counter.value(),
                    waited = ?e.waited,
                    "Admission lock busy"
                );
                return TapDecision::rejected(Some(uid), Some(counter), RejectReason::ServerBusy);
            }
        };

        let outcome = self.admit(&uid, counter, request.auth_tag()).await;
        TapDecision {
            uid: Some(uid),
            counter: Some(counter),
            outcome,
        }
    }

    /// Lease, ledger check, append and advance; runs with the tag lock held
    async fn admit(
        &self,
        uid: &TagIdentity,
        counter: TapCounter,
        auth_tag: Option<&str>,
    ) -> TapOutcome {
        let _lease = match self.ledger.acquire_writer(self.locks.wait()).await {
            Ok(lease) => lease,
            Err(LogError::WriterBusy { waited }) => {
                warn!(
                    uid = %uid,
                    counter = counter.value(),
                    waited = ?waited,
                    "Attendance log writer lease busy"
                );
                return TapOutcome::Rejected(RejectReason::ServerBusy);
            }
            Err(e) => {
                error!(uid = %uid, counter = counter.value(), error = %e, "Writer lease failed");
                return TapOutcome::Rejected(RejectReason::LedgerUnavailable(
                    LedgerError::LeaseFailed(e),
                ));
            }
        };

        let last = match self.ledger.last_counter(uid).await {
            Ok(mark) => mark,
            Err(e) => {
                error!(uid = %uid, counter = counter.value(), error = %e, "Ledger unavailable");
                return TapOutcome::Rejected(RejectReason::LedgerUnavailable(e));
            }
        };

        if let Some(last) = last.counter().filter(|last| counter <= *last) {
            warn!(uid = %uid, counter = counter.value(), last = last.value(), "Replay detected");
            return TapOutcome::Rejected(RejectReason::ReplayDetected { last });
        }

        let record = AttendanceRecord::new(
            uid.clone(),
            counter,
            self.clock.now(),
            auth_tag.unwrap_or_default(),
        );
        let record_id = match self.ledger.log().append(record).await {
            Ok(record_id) => record_id,
            Err(e) => {
                error!(
                    uid = %uid,
                    counter = counter.value(),
                    error = %e,
                    "Attendance append failed"
                );
                return TapOutcome::Rejected(RejectReason::RecordNotStored(e));
            }
        };

        self.ledger.advance(uid, counter);
        info!(uid = %uid, counter = counter.value(), record_id = %record_id, "Tap admitted");
        TapOutcome::Admitted { record_id }
    }
}
