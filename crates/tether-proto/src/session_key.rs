//! Group session key snapshots
//!
//! Both layouts are fixed-size raw binary (big endian index), parsed with
//! `zerocopy` the same way regardless of where the bytes came from:
//!
//! ```text
//! SessionKey (v2, 229 bytes):
//!   version | index u32 | ratchet[128] | signing_key[32] | signature[64]
//! ExportedSessionKey (v1, 165 bytes):
//!   version | index u32 | ratchet[128] | signing_key[32]
//! ```
//!
//! A `SessionKey` is produced by the sender and signed with the group
//! session's Ed25519 key. An `ExportedSessionKey` is produced by any
//! receiver for history sharing and carries no signature.
//!
//! # Security
//!
//! The ratchet bytes are secret. Both types zero their storage on drop and
//! are deliberately not `Copy`.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
use zeroize::Zeroize;

use crate::{
    KEY_LENGTH, SIGNATURE_LENGTH,
    errors::{ProtocolError, Result},
};

/// Length of a serialized Megolm ratchet
pub const RATCHET_LENGTH: usize = 128;

/// Signed snapshot of a group ratchet, sent by the session owner.
#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SessionKey {
    version: u8,
    message_index: [u8; 4],
    ratchet: [u8; RATCHET_LENGTH],
    signing_key: [u8; KEY_LENGTH],
    signature: [u8; SIGNATURE_LENGTH],
}

impl SessionKey {
    /// Size of the serialized key
    pub const SIZE: usize = 1 + 4 + RATCHET_LENGTH + KEY_LENGTH + SIGNATURE_LENGTH;

    /// Current session key version
    pub const VERSION: u8 = 2;

    /// Build a session key, signing every byte before the signature.
    pub fn new(
        message_index: u32,
        ratchet: &[u8; RATCHET_LENGTH],
        signing_key: &[u8; KEY_LENGTH],
        sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LENGTH],
    ) -> Self {
        let mut key = Self {
            version: Self::VERSION,
            message_index: message_index.to_be_bytes(),
            ratchet: *ratchet,
            signing_key: *signing_key,
            signature: [0u8; SIGNATURE_LENGTH],
        };
        key.signature = sign_fn(key.signed_bytes());
        key
    }

    /// Parse a session key from exactly [`Self::SIZE`] bytes.
    ///
    /// The signature is not verified here.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let version = *bytes.first().ok_or(ProtocolError::Truncated {
            expected: Self::SIZE,
            actual: 0,
        })?;
        if version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        Self::read_from_bytes(bytes).map_err(|_| ProtocolError::InvalidFieldLength {
            field: "session_key",
            expected: Self::SIZE,
            actual: bytes.len(),
        })
    }

    /// Serialized bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        IntoBytes::as_bytes(self).to_vec()
    }

    /// Ratchet index the snapshot was taken at.
    pub fn message_index(&self) -> u32 {
        u32::from_be_bytes(self.message_index)
    }

    /// Raw ratchet state.
    pub fn ratchet(&self) -> &[u8; RATCHET_LENGTH] {
        &self.ratchet
    }

    /// Sender's Ed25519 public key.
    pub fn signing_key(&self) -> &[u8; KEY_LENGTH] {
        &self.signing_key
    }

    /// Ed25519 signature over [`Self::signed_bytes`].
    pub fn signature(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.signature
    }

    /// Bytes covered by the signature.
    pub fn signed_bytes(&self) -> &[u8] {
        &IntoBytes::as_bytes(self)[..Self::SIZE - SIGNATURE_LENGTH]
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.as_mut_bytes().zeroize();
    }
}

/// Unsigned snapshot of a group ratchet, exported by a receiver.
#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ExportedSessionKey {
    version: u8,
    message_index: [u8; 4],
    ratchet: [u8; RATCHET_LENGTH],
    signing_key: [u8; KEY_LENGTH],
}

impl ExportedSessionKey {
    /// Size of the serialized key
    pub const SIZE: usize = 1 + 4 + RATCHET_LENGTH + KEY_LENGTH;

    /// Current export version
    pub const VERSION: u8 = 1;

    /// Build an exported key.
    pub fn new(
        message_index: u32,
        ratchet: &[u8; RATCHET_LENGTH],
        signing_key: &[u8; KEY_LENGTH],
    ) -> Self {
        Self {
            version: Self::VERSION,
            message_index: message_index.to_be_bytes(),
            ratchet: *ratchet,
            signing_key: *signing_key,
        }
    }

    /// Parse an exported key from exactly [`Self::SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let version = *bytes.first().ok_or(ProtocolError::Truncated {
            expected: Self::SIZE,
            actual: 0,
        })?;
        if version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        Self::read_from_bytes(bytes).map_err(|_| ProtocolError::InvalidFieldLength {
            field: "exported_session_key",
            expected: Self::SIZE,
            actual: bytes.len(),
        })
    }

    /// Serialized bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        IntoBytes::as_bytes(self).to_vec()
    }

    /// Ratchet index the snapshot was taken at.
    pub fn message_index(&self) -> u32 {
        u32::from_be_bytes(self.message_index)
    }

    /// Raw ratchet state.
    pub fn ratchet(&self) -> &[u8; RATCHET_LENGTH] {
        &self.ratchet
    }

    /// Sender's Ed25519 public key.
    pub fn signing_key(&self) -> &[u8; KEY_LENGTH] {
        &self.signing_key
    }
}

impl Drop for ExportedSessionKey {
    fn drop(&mut self) {
        self.as_mut_bytes().zeroize();
    }
}
