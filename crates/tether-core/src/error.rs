//! Error types for the tether session layer.
//!
//! One error enum covers every entity so callers handle a single
//! `Result<T, OlmError>` regardless of which object they were driving.
//! Lower-layer errors from `tether-crypto` and `tether-proto` convert into it
//! at the boundary.
//!
//! Every operation that returns an error leaves the entity exactly as it was
//! before the call.

use tether_crypto::CryptoError;
use tether_proto::ProtocolError;
use thiserror::Error;

/// Result alias used by every fallible operation in this crate
pub type Result<T> = std::result::Result<T, OlmError>;

/// Errors returned by accounts, sessions, group sessions and pickles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OlmError {
    /// MAC did not verify, or padding was invalid under a verified MAC
    #[error("message authentication failed")]
    BadMessageMac,

    /// Message framing could not be parsed
    #[error("malformed message: {0}")]
    BadMessageFormat(String),

    /// Message carries a version this implementation does not read
    #[error("unsupported message version: {0}")]
    BadMessageVersion(u8),

    /// Message references a one-time key or prekey the account does not hold
    #[error("message references an unknown key")]
    BadMessageKeyId,

    /// Ed25519 signature did not verify
    #[error("signature verification failed")]
    BadSignature,

    /// No key material is available for this message index
    #[error("unknown message index {index}")]
    UnknownMessageIndex {
        /// Index carried by the message
        index: u32,
    },

    /// Message counter is further ahead than the skip window allows
    #[error("message gap of {gap} exceeds limit of {limit}")]
    MessageGapTooLarge {
        /// Number of chain steps needed to reach the message
        gap: u32,
        /// Configured maximum
        limit: u32,
    },

    /// Sequential decryption received a message other than the next one
    #[error("message out of order: expected index {expected}, got {received}")]
    OutOfOrderMessage {
        /// Next index the receiving chain expects
        expected: u32,
        /// Index carried by the message
        received: u32,
    },

    /// Caller supplied fewer random bytes than the operation needs
    #[error("insufficient randomness: needed {needed} bytes, got {got}")]
    InsufficientRandomness {
        /// Bytes required
        needed: usize,
        /// Bytes supplied
        got: usize,
    },

    /// Caller supplied key material of the wrong size
    #[error("buffer of wrong size: expected {expected} bytes, got {actual}")]
    BufferTooSmall {
        /// Bytes required
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// Pickle was written by an older layout that is no longer read
    #[error("unsupported legacy pickle version {0}")]
    BadLegacyPickleVersion(u32),

    /// Pickle was written by a newer layout than this build knows
    #[error("unknown pickle version {0}")]
    UnknownPickleVersion(u32),

    /// Pickle authenticated but its contents do not decode
    #[error("corrupted pickle")]
    CorruptedPickle,

    /// Group session key could not be parsed
    #[error("invalid group session key")]
    BadSessionKey,

    /// Referenced key does not exist
    #[error("unknown key")]
    UnknownKey,
}

impl OlmError {
    /// Returns true if the input can never succeed against this entity.
    ///
    /// Authentication, format and version failures are fatal: retrying the
    /// same bytes will fail again. Index, ordering and key lookup failures are
    /// not: the message may decrypt with another session, in another order,
    /// or once the missing key is available.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::BadMessageMac
            | Self::BadMessageFormat(_)
            | Self::BadMessageVersion(_)
            | Self::BadSignature
            | Self::InsufficientRandomness { .. }
            | Self::BufferTooSmall { .. }
            | Self::BadLegacyPickleVersion(_)
            | Self::UnknownPickleVersion(_)
            | Self::CorruptedPickle
            | Self::BadSessionKey => true,
            Self::BadMessageKeyId
            | Self::UnknownMessageIndex { .. }
            | Self::MessageGapTooLarge { .. }
            | Self::OutOfOrderMessage { .. }
            | Self::UnknownKey => false,
        }
    }
}

impl From<ProtocolError> for OlmError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnsupportedVersion(version) => Self::BadMessageVersion(version),
            other => Self::BadMessageFormat(other.to_string()),
        }
    }
}

impl From<CryptoError> for OlmError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::MacMismatch | CryptoError::InvalidPadding => Self::BadMessageMac,
            CryptoError::BadSignature | CryptoError::InvalidSigningKey => Self::BadSignature,
            CryptoError::InvalidKeyLength { expected, actual } => {
                Self::BufferTooSmall { expected, actual }
            },
            CryptoError::IndexOverflow { current } => Self::UnknownMessageIndex { index: current },
        }
    }
}
