//! Property test strategies for tapguard types

use proptest::prelude::*;
use tapguard_core::{TagIdentity, TapCounter};

// Re-export proptest for convenience
pub use proptest;

/// Any tag identity
pub fn arb_uid() -> impl Strategy<Value = TagIdentity> {
    any::<[u8; 7]>().prop_map(TagIdentity::from_bytes)
}

/// One of `n` distinct tag identities, for tests that need collisions
pub fn arb_uid_from_pool(n: u8) -> impl Strategy<Value = TagIdentity> {
    (0..n.max(1)).prop_map(|i| TagIdentity::from_bytes([0x04, 0, 0, 0, 0, 0, i]))
}

/// Any valid 24-bit counter
pub fn arb_counter() -> impl Strategy<Value = TapCounter> {
    (0u32..=0x00FF_FFFF).prop_map(|value| TapCounter::new(value).unwrap())
}

/// Small counters, so generated sequences revisit values
pub fn arb_small_counter() -> impl Strategy<Value = TapCounter> {
    (0u32..64).prop_map(|value| TapCounter::new(value).unwrap())
}
