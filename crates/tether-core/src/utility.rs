//! Hashing and signature checks for callers that hold raw key bytes.

use tether_crypto::{Ed25519PublicKey, Ed25519Signature};

use crate::error::{OlmError, Result};

/// SHA-256 digest of `input`.
pub fn sha256(input: &[u8]) -> [u8; 32] {
    tether_crypto::sha256(input)
}

/// Verify an Ed25519 `signature` over `message` by the raw public `key`.
///
/// # Errors
///
/// - `OlmError::BufferTooSmall` if `key` is not 32 bytes or `signature` is
///   not 64 bytes
/// - `OlmError::BadSignature` if the key is not a valid point or the
///   signature does not verify
pub fn ed25519_verify(key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let key = Ed25519PublicKey::from_slice(key)?;
    let signature = Ed25519Signature::from_slice(signature)?;
    key.verify(message, &signature).map_err(|_| OlmError::BadSignature)
}
