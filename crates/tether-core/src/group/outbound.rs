//! Sending side of a group session.

use serde::{Deserialize, Serialize};
use tether_crypto::{Ed25519KeyPair, MEGOLM_RATCHET_LENGTH, Megolm};
use tether_proto::{GroupMessage, SessionKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::ratchet_from_pickle;
use crate::{
    env::{Environment, require_random, take_32},
    error::Result,
    pickle::{PickleKey, open, seal},
    session_id::SessionId,
};

/// Random bytes needed by [`OutboundGroupSession::new_with_random`]: the
/// Megolm ratchet followed by the Ed25519 seed
pub const GROUP_SESSION_RANDOM_LENGTH: usize = MEGOLM_RATCHET_LENGTH + 32;

const OUTBOUND_GROUP_PICKLE_VERSION: u32 = 1;

/// A Megolm ratchet and the key that signs every message sent with it.
#[derive(Clone)]
pub struct OutboundGroupSession {
    ratchet: Megolm,
    signing_key: Ed25519KeyPair,
}

impl OutboundGroupSession {
    /// Create a session at index 0 from [`GROUP_SESSION_RANDOM_LENGTH`]
    /// random bytes.
    pub fn new_with_random(random: &[u8]) -> Result<Self> {
        require_random(random, GROUP_SESSION_RANDOM_LENGTH)?;

        let mut ratchet_bytes = [0u8; MEGOLM_RATCHET_LENGTH];
        ratchet_bytes.copy_from_slice(&random[..MEGOLM_RATCHET_LENGTH]);
        let ratchet = Megolm::new(&ratchet_bytes, 0);
        ratchet_bytes.zeroize();

        let mut seed = take_32(random, MEGOLM_RATCHET_LENGTH);
        let signing_key = Ed25519KeyPair::from_seed(&seed);
        seed.zeroize();

        let session = Self { ratchet, signing_key };
        tracing::debug!(session_id = %session.session_id(), "created outbound group session");
        Ok(session)
    }

    /// Create a session with randomness from `env`.
    pub fn new<E: Environment>(env: &E) -> Self {
        let mut random = [0u8; GROUP_SESSION_RANDOM_LENGTH];
        env.random_bytes(&mut random);
        let result = Self::new_with_random(&random);
        random.zeroize();

        let Ok(session) = result else {
            unreachable!("buffer is exactly GROUP_SESSION_RANDOM_LENGTH bytes");
        };
        session
    }

    /// The session's Ed25519 public key, which doubles as its id.
    pub fn session_id(&self) -> SessionId {
        SessionId::from_bytes(*self.signing_key.public_key().as_bytes())
    }

    /// Index the next message will be encrypted at.
    pub fn message_index(&self) -> u32 {
        self.ratchet.index()
    }

    /// Signed snapshot of the ratchet at the current index.
    ///
    /// Receivers created from it can decrypt this and every later message,
    /// never an earlier one.
    pub fn session_key(&self) -> Vec<u8> {
        let mut ratchet = self.ratchet.to_bytes();
        let key = SessionKey::new(
            self.ratchet.index(),
            &ratchet,
            self.signing_key.public_key().as_bytes(),
            |bytes| self.signing_key.sign(bytes).to_bytes(),
        );
        ratchet.zeroize();
        key.to_bytes()
    }

    /// Encrypt `plaintext` at the current index, then advance.
    ///
    /// After `u32::MAX` the index wraps to 0 and receivers reject the wrapped
    /// messages; rotate the session long before that.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let keys = self.ratchet.cipher_keys();
        let message_index = self.ratchet.index();
        let message = GroupMessage { message_index, ciphertext: keys.encrypt(plaintext) };
        let bytes = message
            .encode(|body| keys.mac(body), |signed| self.signing_key.sign(signed).to_bytes());

        tracing::trace!(index = message.message_index, "encrypted group message");
        self.ratchet.advance();
        bytes
    }

    /// Encrypt the session's state under `key`.
    pub fn pickle(&self, key: &PickleKey) -> Vec<u8> {
        let pickle = OutboundGroupPickle {
            ratchet: self.ratchet.to_bytes().to_vec(),
            index: self.ratchet.index(),
            signing_seed: self.signing_key.seed(),
        };
        seal(&pickle, OUTBOUND_GROUP_PICKLE_VERSION, key)
    }

    /// Restore a session from [`OutboundGroupSession::pickle`] output.
    pub fn from_pickle(blob: &[u8], key: &PickleKey) -> Result<Self> {
        let pickle: OutboundGroupPickle = open(blob, OUTBOUND_GROUP_PICKLE_VERSION, key)?;
        Ok(Self {
            ratchet: ratchet_from_pickle(&pickle.ratchet, pickle.index)?,
            signing_key: Ed25519KeyPair::from_seed(&pickle.signing_seed),
        })
    }
}

impl std::fmt::Debug for OutboundGroupSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundGroupSession")
            .field("session_id", &self.session_id())
            .field("message_index", &self.message_index())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct OutboundGroupPickle {
    ratchet: Vec<u8>,
    index: u32,
    signing_seed: [u8; 32],
}
