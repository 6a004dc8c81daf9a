//! Receiving side of a group session.

use serde::{Deserialize, Serialize};
use tether_crypto::{Ed25519PublicKey, Ed25519Signature, Megolm};
use tether_proto::{ExportedSessionKey, GroupMessage, SessionKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::ratchet_from_pickle;
use crate::{
    error::{OlmError, Result},
    pickle::{PickleKey, open, seal},
    session_id::SessionId,
};

const INBOUND_GROUP_PICKLE_VERSION: u32 = 1;

/// Decrypts messages from one group session sender.
///
/// Keeps two ratchets: the one it was created with, which bounds how far back
/// it can decrypt, and the furthest one it has advanced to, so in-order
/// messages cost one ratchet step each.
#[derive(Clone)]
pub struct InboundGroupSession {
    initial_ratchet: Megolm,
    latest_ratchet: Megolm,
    signing_key: Ed25519PublicKey,
    verified: bool,
}

impl InboundGroupSession {
    /// Create a session from a signed session key.
    ///
    /// # Errors
    ///
    /// - `OlmError::BadSessionKey` if the key does not parse
    /// - `OlmError::BadSignature` if its signature does not verify
    pub fn new(session_key: &[u8]) -> Result<Self> {
        let key = SessionKey::from_bytes(session_key).map_err(|_| OlmError::BadSessionKey)?;
        let signing_key =
            Ed25519PublicKey::from_bytes(*key.signing_key()).map_err(|_| OlmError::BadSessionKey)?;
        signing_key
            .verify(key.signed_bytes(), &Ed25519Signature::from_bytes(*key.signature()))
            .map_err(|_| OlmError::BadSignature)?;

        let ratchet = Megolm::new(key.ratchet(), key.message_index());
        let session = Self {
            initial_ratchet: ratchet.clone(),
            latest_ratchet: ratchet,
            signing_key,
            verified: true,
        };

        tracing::debug!(
            session_id = %session.session_id(),
            first_known_index = session.first_known_index(),
            "created inbound group session"
        );
        Ok(session)
    }

    /// Create a session from an unsigned export.
    ///
    /// The session is unverified until a message decrypts, which proves the
    /// sender holds the signing key the export named.
    pub fn import(exported_key: &[u8]) -> Result<Self> {
        let key =
            ExportedSessionKey::from_bytes(exported_key).map_err(|_| OlmError::BadSessionKey)?;
        let signing_key =
            Ed25519PublicKey::from_bytes(*key.signing_key()).map_err(|_| OlmError::BadSessionKey)?;

        let ratchet = Megolm::new(key.ratchet(), key.message_index());
        let session = Self {
            initial_ratchet: ratchet.clone(),
            latest_ratchet: ratchet,
            signing_key,
            verified: false,
        };

        tracing::debug!(
            session_id = %session.session_id(),
            first_known_index = session.first_known_index(),
            "imported inbound group session"
        );
        Ok(session)
    }

    /// The sender's Ed25519 public key, which doubles as the session id.
    pub fn session_id(&self) -> SessionId {
        SessionId::from_bytes(*self.signing_key.as_bytes())
    }

    /// Lowest message index this session can decrypt.
    pub fn first_known_index(&self) -> u32 {
        self.initial_ratchet.index()
    }

    /// Whether the session came from a signed key or has decrypted a message.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Decrypt a group message, returning the plaintext and its index.
    ///
    /// Replays decrypt again; callers that need replay protection track the
    /// returned indices.
    ///
    /// # Errors
    ///
    /// - `OlmError::BadSignature` if the sender's signature does not verify
    /// - `OlmError::UnknownMessageIndex` if the index is below
    ///   [`InboundGroupSession::first_known_index`]
    /// - `OlmError::BadMessageMac` if authentication fails
    pub fn decrypt(&mut self, message: &[u8]) -> Result<(Vec<u8>, u32)> {
        let parsed = GroupMessage::decode(message)?;
        let signature = Ed25519Signature::from_bytes(*parsed.signature);
        if self.signing_key.verify(parsed.signed, &signature).is_err() {
            tracing::warn!(session_id = %self.session_id(), "group message signature failed");
            return Err(OlmError::BadSignature);
        }

        let index = parsed.message.message_index;
        if index < self.initial_ratchet.index() {
            return Err(OlmError::UnknownMessageIndex { index });
        }

        let advances_latest = index >= self.latest_ratchet.index();
        let mut ratchet = if advances_latest {
            self.latest_ratchet.clone()
        } else {
            self.initial_ratchet.clone()
        };
        ratchet.advance_to(index);

        let keys = ratchet.cipher_keys();
        if keys.verify_mac(parsed.body, parsed.mac).is_err() {
            tracing::warn!(
                session_id = %self.session_id(),
                index,
                "group message authentication failed"
            );
            return Err(OlmError::BadMessageMac);
        }
        let plaintext = keys.decrypt(&parsed.message.ciphertext)?;

        if advances_latest {
            self.latest_ratchet = ratchet;
        }
        self.verified = true;

        tracing::trace!(index, "decrypted group message");
        Ok((plaintext, index))
    }

    /// Export the ratchet at `index` so another session can start there.
    ///
    /// # Errors
    ///
    /// - `OlmError::UnknownMessageIndex` if `index` is below
    ///   [`InboundGroupSession::first_known_index`]
    pub fn export_at(&self, index: u32) -> Result<Vec<u8>> {
        if index < self.initial_ratchet.index() {
            return Err(OlmError::UnknownMessageIndex { index });
        }

        let mut ratchet = self.initial_ratchet.clone();
        ratchet.advance_to(index);
        let mut bytes = ratchet.to_bytes();
        let key = ExportedSessionKey::new(index, &bytes, self.signing_key.as_bytes());
        bytes.zeroize();
        Ok(key.to_bytes())
    }

    /// Export the ratchet at [`InboundGroupSession::first_known_index`].
    pub fn export_first(&self) -> Vec<u8> {
        let mut bytes = self.initial_ratchet.to_bytes();
        let key = ExportedSessionKey::new(
            self.initial_ratchet.index(),
            &bytes,
            self.signing_key.as_bytes(),
        );
        bytes.zeroize();
        key.to_bytes()
    }

    /// Encrypt the session's state under `key`.
    pub fn pickle(&self, key: &PickleKey) -> Vec<u8> {
        let pickle = InboundGroupPickle {
            initial_ratchet: self.initial_ratchet.to_bytes().to_vec(),
            initial_index: self.initial_ratchet.index(),
            latest_ratchet: self.latest_ratchet.to_bytes().to_vec(),
            latest_index: self.latest_ratchet.index(),
            signing_key: *self.signing_key.as_bytes(),
            verified: self.verified,
        };
        seal(&pickle, INBOUND_GROUP_PICKLE_VERSION, key)
    }

    /// Restore a session from [`InboundGroupSession::pickle`] output.
    pub fn from_pickle(blob: &[u8], key: &PickleKey) -> Result<Self> {
        let pickle: InboundGroupPickle = open(blob, INBOUND_GROUP_PICKLE_VERSION, key)?;
        Ok(Self {
            initial_ratchet: ratchet_from_pickle(&pickle.initial_ratchet, pickle.initial_index)?,
            latest_ratchet: ratchet_from_pickle(&pickle.latest_ratchet, pickle.latest_index)?,
            signing_key: Ed25519PublicKey::from_bytes(pickle.signing_key)
                .map_err(|_| OlmError::CorruptedPickle)?,
            verified: pickle.verified,
        })
    }
}

impl std::fmt::Debug for InboundGroupSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundGroupSession")
            .field("session_id", &self.session_id())
            .field("first_known_index", &self.first_known_index())
            .field("verified", &self.verified)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct InboundGroupPickle {
    initial_ratchet: Vec<u8>,
    initial_index: u32,
    latest_ratchet: Vec<u8>,
    latest_index: u32,
    signing_key: [u8; 32],
    verified: bool,
}
