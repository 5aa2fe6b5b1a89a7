//! Attendance domain types
//!
//! Everything in this module is plain data: identities and counters recovered from a
//! tap payload, the per-tag high-water mark, and the immutable rows of the attendance log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of raw bytes in a tag UID.
pub const TAG_UID_LEN: usize = 7;

/// Number of raw bytes in a tap counter.
pub const TAP_COUNTER_LEN: usize = 3;

// =============================================================================
// Tag identity
// =============================================================================

/// Errors produced when parsing a [`TagIdentity`] from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagIdentityError {
    /// The identity did not have exactly 14 hex digits
    #[error("tag identity must be {expected} hex digits, got {actual}")]
    InvalidLength {
        /// Required number of hex digits
        expected: usize,
        /// Number of characters supplied
        actual: usize,
    },

    /// The identity contained a non-hex character
    #[error("tag identity contains non-hex character {found:?}")]
    InvalidDigit {
        /// First offending character
        found: char,
    },
}

/// Identifier of a physical tag, rendered as 14 upper-case hex digits.
///
/// Not secret. Used as the ledger key and written verbatim into every attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagIdentity {
    bytes: [u8; TAG_UID_LEN],
    text: String,
}

impl TagIdentity {
    /// Build an identity from the raw UID bytes of a decrypted payload
    pub fn from_bytes(bytes: [u8; TAG_UID_LEN]) -> Self {
        Self {
            bytes,
            text: hex::encode_upper(bytes),
        }
    }

    /// Parse a textual identity, normalizing to upper case
    pub fn parse(text: &str) -> Result<Self, TagIdentityError> {
        let trimmed = text.trim();
        let expected = TAG_UID_LEN * 2;
        if let Some(found) = trimmed.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(TagIdentityError::InvalidDigit { found });
        }
        if trimmed.len() != expected {
            return Err(TagIdentityError::InvalidLength {
                expected,
                actual: trimmed.len(),
            });
        }
        let mut bytes = [0u8; TAG_UID_LEN];
        hex::decode_to_slice(trimmed, &mut bytes).map_err(|_| TagIdentityError::InvalidLength {
            expected,
            actual: trimmed.len(),
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// The identity as upper-case hex
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The raw UID bytes
    pub fn to_bytes(&self) -> [u8; TAG_UID_LEN] {
        self.bytes
    }
}

impl fmt::Display for TagIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl TryFrom<String> for TagIdentity {
    type Error = TagIdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TagIdentity> for String {
    fn from(value: TagIdentity) -> Self {
        value.text
    }
}

impl std::str::FromStr for TagIdentity {
    type Err = TagIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// Tap counter
// =============================================================================

/// Error produced when a counter value does not fit the 24-bit wire field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tap counter {value} exceeds the 24-bit maximum 16777215")]
pub struct TapCounterError {
    /// Rejected value
    pub value: u32,
}

/// A tag's monotonic read counter.
///
/// Strictly increasing across genuine taps of the same tag; gaps are normal because other
/// readers may tap the tag or a tap may never reach this server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub struct TapCounter(u32);

impl TapCounter {
    /// Largest value a tag can report
    pub const MAX: TapCounter = TapCounter(0x00FF_FFFF);

    /// Zero, the value of a factory-fresh tag before its first read
    pub const ZERO: TapCounter = TapCounter(0);

    /// Create a counter, rejecting values wider than 24 bits
    pub fn new(value: u32) -> Result<Self, TapCounterError> {
        if value > Self::MAX.0 {
            return Err(TapCounterError { value });
        }
        Ok(Self(value))
    }

    /// Interpret three payload bytes as a big-endian counter
    pub fn from_be_bytes(bytes: [u8; TAP_COUNTER_LEN]) -> Self {
        Self(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    /// Big-endian wire form
    pub fn to_be_bytes(self) -> [u8; TAP_COUNTER_LEN] {
        let [_, a, b, c] = self.0.to_be_bytes();
        [a, b, c]
    }

    /// Numeric value
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TapCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for TapCounter {
    type Error = TapCounterError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TapCounter> for u32 {
    fn from(value: TapCounter) -> Self {
        value.0
    }
}

// =============================================================================
// High-water mark
// =============================================================================

/// The largest counter accepted so far for one tag.
///
/// `Unseen` plays the role of the legacy `-1` sentinel: every counter, including zero,
/// is admissible against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HighWaterMark {
    /// No accepted tap is on record
    #[default]
    Unseen,
    /// Highest accepted counter
    At(TapCounter),
}

impl HighWaterMark {
    /// Whether `counter` is strictly above this mark
    pub fn admits(self, counter: TapCounter) -> bool {
        match self {
            HighWaterMark::Unseen => true,
            HighWaterMark::At(last) => counter > last,
        }
    }

    /// The larger of this mark and `counter`
    pub fn max_with(self, counter: TapCounter) -> Self {
        match self {
            HighWaterMark::At(last) if last >= counter => self,
            _ => HighWaterMark::At(counter),
        }
    }

    /// Accepted counter, if any
    pub fn counter(self) -> Option<TapCounter> {
        match self {
            HighWaterMark::Unseen => None,
            HighWaterMark::At(counter) => Some(counter),
        }
    }

    /// Legacy numeric form, `-1` when unseen
    pub fn as_i64(self) -> i64 {
        match self {
            HighWaterMark::Unseen => -1,
            HighWaterMark::At(counter) => i64::from(counter.value()),
        }
    }
}

impl fmt::Display for HighWaterMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HighWaterMark::Unseen => f.write_str("unseen"),
            HighWaterMark::At(counter) => write!(f, "{counter}"),
        }
    }
}

// =============================================================================
// Attendance records
// =============================================================================

/// Opaque unique identifier of one attendance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One immutable row of the append-only attendance log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Unique row identifier
    pub record_id: RecordId,
    /// Tag that was tapped
    pub uid: TagIdentity,
    /// Counter carried by the tap
    pub counter: TapCounter,
    /// Wall-clock time the tap was admitted
    pub recorded_at: DateTime<Utc>,
    /// Integrity code supplied with the tap, empty when absent
    pub auth_tag: String,
}

impl AttendanceRecord {
    /// Create a record with a fresh identifier
    pub fn new(
        uid: TagIdentity,
        counter: TapCounter,
        recorded_at: DateTime<Utc>,
        auth_tag: impl Into<String>,
    ) -> Self {
        Self {
            record_id: RecordId::new(),
            uid,
            counter,
            recorded_at,
            auth_tag: auth_tag.into(),
        }
    }
}
