//! SUN integrity code
//!
//! Tags configured for secure dynamic messaging append a truncated AES-CMAC to every tap.
//! The code is derived from a per-tap session key, so it binds the UID and counter to the
//! tag's MAC key and cannot be produced without it.

use crate::payload::DecodedPayload;
use aes::Aes128;
use cmac::digest::generic_array::GenericArray;
use cmac::{Cmac, Mac};
use subtle::ConstantTimeEq;
use tapguard_core::types::{TAG_UID_LEN, TAP_COUNTER_LEN};
use tapguard_core::{SecretKey, TagIdentity, TapCounter};
use zeroize::Zeroize;

/// Length of the truncated integrity code in bytes.
pub const SDM_MAC_LEN: usize = 8;

const SV2_PREFIX: [u8; 6] = [0x3C, 0xC3, 0x00, 0x01, 0x00, 0x80];
const SV2_LEN: usize = SV2_PREFIX.len() + TAG_UID_LEN + TAP_COUNTER_LEN;

/// Reasons a tap fails integrity verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    /// No integrity code accompanied the tap
    #[error("integrity code missing")]
    Missing,

    /// The integrity code was not 16 hex digits
    #[error("integrity code malformed")]
    Malformed,

    /// The integrity code does not match the payload
    #[error("integrity code mismatch")]
    Mismatch,
}

/// Compute the truncated integrity code a genuine tag emits for `uid` at `counter`
pub fn compute_sdm_mac(
    mac_key: &SecretKey,
    uid: &TagIdentity,
    counter: TapCounter,
) -> [u8; SDM_MAC_LEN] {
    // SDMReadCtr enters the session vector least-significant byte first
    let [c0, c1, c2] = counter.to_be_bytes();
    let mut sv2 = [0u8; SV2_LEN];
    sv2[..6].copy_from_slice(&SV2_PREFIX);
    sv2[6..6 + TAG_UID_LEN].copy_from_slice(&uid.to_bytes());
    sv2[6 + TAG_UID_LEN..].copy_from_slice(&[c2, c1, c0]);

    let mut kdf = <Cmac<Aes128> as Mac>::new(GenericArray::from_slice(mac_key.expose()));
    kdf.update(&sv2);
    let mut session_key = kdf.finalize().into_bytes();

    let full = <Cmac<Aes128> as Mac>::new(&session_key)
        .finalize()
        .into_bytes();
    session_key.as_mut_slice().zeroize();

    let mut truncated = [0u8; SDM_MAC_LEN];
    for (slot, byte) in truncated.iter_mut().zip(full.iter().skip(1).step_by(2)) {
        *slot = *byte;
    }
    truncated
}

/// Checks the integrity code supplied alongside a decoded payload
#[derive(Debug, Clone)]
pub struct SdmMacVerifier {
    key: SecretKey,
}

impl SdmMacVerifier {
    /// Create a verifier for `key`
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    /// Verify `supplied` against the code expected for `payload`
    pub fn verify(
        &self,
        payload: &DecodedPayload,
        supplied: Option<&str>,
    ) -> Result<(), IntegrityError> {
        let supplied = supplied.map(str::trim).filter(|s| !s.is_empty());
        let Some(text) = supplied else {
            return Err(IntegrityError::Missing);
        };

        let mut received = [0u8; SDM_MAC_LEN];
        hex::decode_to_slice(text, &mut received).map_err(|_| IntegrityError::Malformed)?;

        let expected = compute_sdm_mac(&self.key, &payload.uid, payload.counter);
        if bool::from(expected.ct_eq(&received)) {
            Ok(())
        } else {
            Err(IntegrityError::Mismatch)
        }
    }
}
