//! # tapguard Codec - Layer 2: Payload Cryptography
//!
//! **Purpose**: Turn the hex payload a tag mirrors into its URL back into the tag's
//! identity and tap counter, and optionally check the integrity code sent alongside it.
//!
//! Both operations are pure functions of their input and the configured keys. Deciding
//! whether a decoded tap is fresh is not this crate's concern (see `tapguard-attendance`).
//!
//! ## Payload layout
//!
//! The tag encrypts a zero-padded plaintext with AES-128 in CBC mode under an all-zero IV:
//!
//! ```text
//! byte  0       7        10            16
//!       | UID(7) | CTR(3) | padding ... |
//! ```
//!
//! The counter is read big-endian. Anything after byte 10 is ignored.
//!
//! ## Integrity code
//!
//! Tags configured for secure dynamic messaging also append a truncated AES-CMAC
//! (see [`sun_mac`]). Whether it gates admission is a deployment decision.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod payload;
pub mod sun_mac;

pub use payload::{decode, DecodeError, DecodedPayload, PayloadCodec, BLOCK_LEN, MIN_PLAINTEXT_LEN};
pub use sun_mac::{compute_sdm_mac, IntegrityError, SdmMacVerifier, SDM_MAC_LEN};
