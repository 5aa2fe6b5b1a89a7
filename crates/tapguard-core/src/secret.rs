//! Secret key material
//!
//! Tag keys are 16-byte AES-128 keys provisioned through deployment configuration.
//! The bytes are zeroized on drop, never printed, and compared in constant time.

use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of an AES-128 tag key in bytes.
pub const SECRET_KEY_LEN: usize = 16;

/// Errors produced when parsing key material
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The text was not valid hex
    #[error("key is not valid hex")]
    InvalidHex,

    /// The decoded key had the wrong length
    #[error("key must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required length in bytes
        expected: usize,
        /// Decoded length in bytes
        actual: usize,
    },
}

/// A 16-byte symmetric key shared with the tags of one deployment
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; SECRET_KEY_LEN]);

impl SecretKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; SECRET_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a key from 32 hex digits; whitespace around the value is ignored
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let mut decoded = hex::decode(text.trim()).map_err(|_| KeyError::InvalidHex)?;
        if decoded.len() != SECRET_KEY_LEN {
            let actual = decoded.len();
            decoded.zeroize();
            return Err(KeyError::InvalidLength {
                expected: SECRET_KEY_LEN,
                actual,
            });
        }
        let mut bytes = [0u8; SECRET_KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self(bytes))
    }

    /// Borrow the raw key bytes
    pub fn expose(&self) -> &[u8; SECRET_KEY_LEN] {
        &self.0
    }

    /// Whether this is the all-zero factory key every new tag ships with
    pub fn is_factory_default(&self) -> bool {
        self.0.ct_eq(&[0u8; SECRET_KEY_LEN]).into()
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl TryFrom<String> for SecretKey {
    type Error = KeyError;

    fn try_from(mut value: String) -> Result<Self, Self::Error> {
        let key = Self::from_hex(&value);
        value.zeroize();
        key
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_keys() {
        let key = SecretKey::from_hex("00112233445566778899AABBCCDDEEFF").unwrap();
        assert_eq!(key.expose()[0], 0x00);
        assert_eq!(key.expose()[15], 0xFF);
        assert!(!key.is_factory_default());
    }

    #[test]
    fn rejects_wrong_length_and_bad_hex() {
        assert_eq!(
            SecretKey::from_hex("0011"),
            Err(KeyError::InvalidLength {
                expected: 16,
                actual: 2
            })
        );
        assert_eq!(SecretKey::from_hex("zz"), Err(KeyError::InvalidHex));
    }

    #[test]
    fn detects_factory_key() {
        let key = SecretKey::from_hex(&"0".repeat(32)).unwrap();
        assert!(key.is_factory_default());
    }

    #[test]
    fn debug_never_prints_bytes() {
        let key = SecretKey::from_bytes([0xAB; 16]);
        let printed = format!("{key:?}");
        assert!(!printed.to_lowercase().contains("ab"));
    }
}
