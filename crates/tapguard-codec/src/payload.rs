//! Tap payload decryption

use aes::Aes128;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use tapguard_core::types::{TAG_UID_LEN, TAP_COUNTER_LEN};
use tapguard_core::{SecretKey, TagIdentity, TapCounter};
use zeroize::Zeroize;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES block size in bytes.
pub const BLOCK_LEN: usize = 16;

/// Plaintext bytes the field layout occupies (UID followed by counter).
pub const MIN_PLAINTEXT_LEN: usize = TAG_UID_LEN + TAP_COUNTER_LEN;

/// IV fixed by the secure element's SDM configuration.
const ZERO_IV: [u8; BLOCK_LEN] = [0u8; BLOCK_LEN];

/// Reasons a payload cannot be decoded.
///
/// These describe structure only. A payload encrypted under a different key decodes
/// successfully into a meaningless identity; authenticity is the integrity code's job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload was empty
    #[error("payload is empty")]
    Empty,

    /// The payload had an odd number of hex digits
    #[error("payload has odd hex length {len}")]
    OddLength {
        /// Number of hex digits received
        len: usize,
    },

    /// The payload contained a non-hex character
    #[error("payload is not valid hex")]
    InvalidHex,

    /// The ciphertext is not a whole number of cipher blocks
    #[error("ciphertext length {len} is not a multiple of 16 bytes")]
    NotBlockAligned {
        /// Ciphertext length in bytes
        len: usize,
    },

    /// The plaintext is too short to hold the UID and counter fields
    #[error("plaintext length {len} is shorter than 10 bytes")]
    PlaintextTooShort {
        /// Plaintext length in bytes
        len: usize,
    },
}

/// Identity and counter recovered from one tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    /// Tag that produced the payload
    pub uid: TagIdentity,
    /// Counter value at the time of the tap
    pub counter: TapCounter,
}

/// Decrypt `cipher_hex` under `key` and extract the tag identity and tap counter
pub fn decode(cipher_hex: &str, key: &SecretKey) -> Result<DecodedPayload, DecodeError> {
    let text = cipher_hex.trim();
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }
    if text.len() % 2 != 0 {
        return Err(DecodeError::OddLength { len: text.len() });
    }

    let mut buf = hex::decode(text).map_err(|_| DecodeError::InvalidHex)?;
    if buf.len() % BLOCK_LEN != 0 {
        return Err(DecodeError::NotBlockAligned { len: buf.len() });
    }

    let result = decrypt_fields(&mut buf, key);
    buf.zeroize();
    result
}

fn decrypt_fields(buf: &mut [u8], key: &SecretKey) -> Result<DecodedPayload, DecodeError> {
    let len = buf.len();
    let plaintext = Aes128CbcDec::new(
        GenericArray::from_slice(key.expose()),
        GenericArray::from_slice(&ZERO_IV),
    )
    .decrypt_padded_mut::<NoPadding>(buf)
    .map_err(|_| DecodeError::NotBlockAligned { len })?;

    if plaintext.len() < MIN_PLAINTEXT_LEN {
        return Err(DecodeError::PlaintextTooShort {
            len: plaintext.len(),
        });
    }

    let mut uid = [0u8; TAG_UID_LEN];
    uid.copy_from_slice(&plaintext[..TAG_UID_LEN]);
    let mut counter = [0u8; TAP_COUNTER_LEN];
    counter.copy_from_slice(&plaintext[TAG_UID_LEN..MIN_PLAINTEXT_LEN]);

    Ok(DecodedPayload {
        uid: TagIdentity::from_bytes(uid),
        counter: TapCounter::from_be_bytes(counter),
    })
}

/// Payload decoder bound to a deployment's tag key
#[derive(Debug, Clone)]
pub struct PayloadCodec {
    key: SecretKey,
}

impl PayloadCodec {
    /// Create a codec for `key`
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    /// Decode one payload
    pub fn decode(&self, cipher_hex: &str) -> Result<DecodedPayload, DecodeError> {
        decode(cipher_hex, &self.key)
    }
}
