//! Genuine tap payloads
//!
//! Builds exactly what a tag mirrors into its URL: the UID and big-endian counter, zero
//! padded to whole cipher blocks, encrypted with AES-128-CBC under a zero IV, plus the
//! truncated integrity code when a MAC key is supplied.

use aes::Aes128;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
use tapguard_codec::{compute_sdm_mac, BLOCK_LEN};
use tapguard_core::{SecretKey, TagIdentity, TapCounter};

use crate::fixtures::{test_mac_key, test_secret_key};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;

/// Encrypt an arbitrary plaintext the way a tag does, returning upper-case hex
pub fn encrypt_payload(key: &SecretKey, plaintext: &[u8]) -> String {
    let blocks = plaintext.len().div_ceil(BLOCK_LEN).max(1);
    let mut buf = vec![0u8; blocks * BLOCK_LEN];
    buf[..plaintext.len()].copy_from_slice(plaintext);
    let len = buf.len();
    let ciphertext = Aes128CbcEnc::new(
        GenericArray::from_slice(key.expose()),
        GenericArray::from_slice(&[0u8; BLOCK_LEN]),
    )
    .encrypt_padded_mut::<NoPadding>(&mut buf, len)
    .expect("buffer is block aligned");
    hex::encode_upper(ciphertext)
}

/// Query parameters of one built tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltTap {
    /// Hex ciphertext for the `data` parameter
    pub data: String,
    /// Integrity code for the `cmac` parameter
    pub cmac: Option<String>,
}

impl BuiltTap {
    /// The URL a tag would emit for this tap
    pub fn url(&self, base: &str) -> String {
        match &self.cmac {
            Some(cmac) => format!("{base}?data={}&cmac={cmac}", self.data),
            None => format!("{base}?data={}", self.data),
        }
    }
}

/// Builder for a single tap
#[derive(Debug, Clone)]
pub struct TapPayloadBuilder {
    uid: TagIdentity,
    counter: TapCounter,
    key: SecretKey,
    mac_key: Option<SecretKey>,
    blocks: usize,
}

impl TapPayloadBuilder {
    /// Tap of `uid` at `counter` under the test payload key, one block, no integrity code
    pub fn new(uid: TagIdentity, counter: TapCounter) -> Self {
        Self {
            uid,
            counter,
            key: test_secret_key(),
            mac_key: None,
            blocks: 1,
        }
    }

    /// Encrypt under `key` instead of the test key
    pub fn with_key(mut self, key: SecretKey) -> Self {
        self.key = key;
        self
    }

    /// Attach an integrity code computed with the test MAC key
    pub fn with_test_mac(self) -> Self {
        self.with_mac_key(test_mac_key())
    }

    /// Attach an integrity code computed with `key`
    pub fn with_mac_key(mut self, key: SecretKey) -> Self {
        self.mac_key = Some(key);
        self
    }

    /// Pad the plaintext to `blocks` cipher blocks
    pub fn with_blocks(mut self, blocks: usize) -> Self {
        self.blocks = blocks.max(1);
        self
    }

    /// Produce the tap
    pub fn build(&self) -> BuiltTap {
        let mut plaintext = vec![0u8; self.blocks * BLOCK_LEN];
        plaintext[..7].copy_from_slice(&self.uid.to_bytes());
        plaintext[7..10].copy_from_slice(&self.counter.to_be_bytes());
        BuiltTap {
            data: encrypt_payload(&self.key, &plaintext),
            cmac: self
                .mac_key
                .as_ref()
                .map(|key| hex::encode_upper(compute_sdm_mac(key, &self.uid, self.counter))),
        }
    }
}
