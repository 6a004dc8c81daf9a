//! Error types for primitive operations

use thiserror::Error;

/// Errors from the primitive adapter and ratchet math.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key material of the wrong size was supplied
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Required length in bytes
        expected: usize,
        /// Supplied length in bytes
        actual: usize,
    },

    /// Ed25519 public key bytes do not decode to a curve point
    #[error("invalid ed25519 public key")]
    InvalidSigningKey,

    /// Ed25519 signature did not verify
    #[error("signature verification failed")]
    BadSignature,

    /// Truncated HMAC did not match
    #[error("MAC verification failed")]
    MacMismatch,

    /// Ciphertext decrypted to invalid PKCS#7 padding
    #[error("invalid ciphertext padding")]
    InvalidPadding,

    /// A ratchet counter would wrap around
    #[error("ratchet index overflow at {current}")]
    IndexOverflow {
        /// Index at which the overflow was detected
        current: u32,
    },
}
