//! Keys, identities and records used across test suites

use chrono::{DateTime, TimeZone, Utc};
use tapguard_core::{AttendanceRecord, SecretKey, TagIdentity, TapCounter, TapGuardConfig};

/// Payload key shared by test tags
pub const TEST_SECRET_KEY_HEX: &str = "2B7E151628AED2A6ABF7158809CF4F3C";

/// Integrity-code key shared by test tags
pub const TEST_MAC_KEY_HEX: &str = "FFEEDDCCBBAA99887766554433221100";

/// The payload key as a [`SecretKey`]
pub fn test_secret_key() -> SecretKey {
    SecretKey::from_hex(TEST_SECRET_KEY_HEX).unwrap()
}

/// The integrity-code key as a [`SecretKey`]
pub fn test_mac_key() -> SecretKey {
    SecretKey::from_hex(TEST_MAC_KEY_HEX).unwrap()
}

/// Validated configuration with defaults and no integrity enforcement
pub fn test_config() -> TapGuardConfig {
    TapGuardConfig::with_secret_key(test_secret_key()).unwrap()
}

/// Validated configuration that enforces integrity codes
pub fn test_config_with_mac() -> TapGuardConfig {
    let mut config = test_config();
    config.sdm_mac_key = Some(test_mac_key());
    config.validate().unwrap();
    config
}

/// Parse a tag identity
pub fn uid(text: &str) -> TagIdentity {
    TagIdentity::parse(text).unwrap()
}

/// Build a counter
pub fn counter(value: u32) -> TapCounter {
    TapCounter::new(value).unwrap()
}

/// Instant every fixed clock starts from
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

/// A record for `uid` at `value`, stamped with [`test_epoch`]
pub fn record(uid: &TagIdentity, value: u32) -> AttendanceRecord {
    AttendanceRecord::new(uid.clone(), counter(value), test_epoch(), "")
}
