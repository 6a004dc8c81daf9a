//! Encrypted persistence for long-lived secret state.
//!
//! A pickle is the entity's private state serialized to CBOR, prefixed with a
//! layout version, encrypted with AES-256-CBC and followed by a truncated
//! HMAC over the ciphertext:
//!
//! ```text
//! AES-256-CBC( version u32 BE || CBOR body ) || HMAC-SHA256[..8]
//! ```
//!
//! Cipher keys are expanded from a caller-supplied 32-byte [`PickleKey`] with
//! the label `Pickle`. Deriving that key from a passphrase (with a slow,
//! salted KDF) is the caller's responsibility.
//!
//! # Invariants
//!
//! - The MAC is verified before anything is decrypted
//! - A blob whose version differs from the current one is rejected, never
//!   migrated
//! - Plaintext buffers are zeroized on every path

use serde::{Serialize, de::DeserializeOwned};
use tether_crypto::{AES_BLOCK_SIZE, CipherKeys, MAC_LENGTH};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{OlmError, Result};

/// Label used to expand a pickle key into cipher keys
const PICKLE_INFO: &[u8] = b"Pickle";

const VERSION_LENGTH: usize = 4;

/// Symmetric key protecting pickles.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PickleKey([u8; 32]);

impl PickleKey {
    /// Wrap 32 bytes of key material.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a key from a slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| OlmError::BufferTooSmall { expected: 32, actual: bytes.len() })?;
        Ok(Self(key))
    }

    fn cipher_keys(&self) -> CipherKeys {
        CipherKeys::derive(&self.0, PICKLE_INFO)
    }
}

impl std::fmt::Debug for PickleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PickleKey(..)")
    }
}

/// Serialize, encrypt and authenticate `value` under `version`.
pub(crate) fn seal<T: Serialize>(value: &T, version: u32, key: &PickleKey) -> Vec<u8> {
    let mut plaintext = version.to_be_bytes().to_vec();
    let Ok(()) = ciborium::ser::into_writer(value, &mut plaintext) else {
        unreachable!("CBOR encoding of pickle state into a Vec cannot fail");
    };

    let keys = key.cipher_keys();
    let mut blob = keys.encrypt(&plaintext);
    plaintext.zeroize();

    let mac = keys.mac(&blob);
    blob.extend_from_slice(&mac);
    blob
}

/// Authenticate, decrypt and deserialize a pickle written at `version`.
///
/// # Errors
///
/// - `OlmError::BadMessageMac` if the blob was not produced with this key
/// - `OlmError::BadLegacyPickleVersion` if the blob predates `version`
/// - `OlmError::UnknownPickleVersion` if the blob is newer than `version`
/// - `OlmError::CorruptedPickle` if the blob is malformed
pub(crate) fn open<T: DeserializeOwned>(blob: &[u8], version: u32, key: &PickleKey) -> Result<T> {
    if blob.len() < AES_BLOCK_SIZE + MAC_LENGTH {
        return Err(OlmError::CorruptedPickle);
    }
    let (ciphertext, mac) = blob.split_at(blob.len() - MAC_LENGTH);

    let keys = key.cipher_keys();
    keys.verify_mac(ciphertext, mac)?;
    let mut plaintext = keys.decrypt(ciphertext).map_err(|_| OlmError::CorruptedPickle)?;

    let result = decode_body(&plaintext, version);
    plaintext.zeroize();
    result
}

fn decode_body<T: DeserializeOwned>(plaintext: &[u8], current: u32) -> Result<T> {
    if plaintext.len() < VERSION_LENGTH {
        return Err(OlmError::CorruptedPickle);
    }
    let (version, body) = plaintext.split_at(VERSION_LENGTH);
    let mut version_bytes = [0u8; VERSION_LENGTH];
    version_bytes.copy_from_slice(version);
    let version = u32::from_be_bytes(version_bytes);

    if version < current {
        tracing::warn!(version, current, "rejecting legacy pickle");
        return Err(OlmError::BadLegacyPickleVersion(version));
    }
    if version > current {
        tracing::warn!(version, current, "rejecting pickle from a newer layout");
        return Err(OlmError::UnknownPickleVersion(version));
    }

    ciborium::de::from_reader(body).map_err(|_| OlmError::CorruptedPickle)
}
