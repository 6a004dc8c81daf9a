//! Pairwise double ratchet sessions.
//!
//! A session is created once per peer device, either outbound from the
//! peer's published keys or inbound from the first message the peer sent.
//! After that both ends call [`Session::encrypt`] and [`Session::decrypt`].
//!
//! # Lifecycle
//!
//! ```text
//! Alice                                           Bob
//!   │ create_outbound(identity, prekey, otk)        │
//!   │── PreKey message (handshake keys + msg 0) ───►│ create_inbound(message)
//!   │                                               │ decrypt(PreKey, message)
//!   │                                               │ account.remove_one_time_keys
//!   │◄──────────── Normal message (new ratchet) ────│
//!   │── Normal message (new ratchet) ──────────────►│
//! ```
//!
//! The first message of an outbound session is a prekey message; every later
//! message is a normal message. Each change of speaker performs one
//! Diffie-Hellman ratchet step.
//!
//! # Invariants
//!
//! - Every failed call leaves the session exactly as it was
//! - Message keys are used once and zeroized on drop
//! - Receiving chains and skipped keys stay within [`SessionConfig`] bounds

mod chains;
mod handshake;

use serde::{Deserialize, Serialize};
use tether_crypto::{
    ChainKey, Curve25519KeyPair, Curve25519PublicKey, Ed25519PublicKey, MessageKey, RootKey,
    derive_initial_keys,
};
use tether_proto::{Message, MessageType, PreKeyMessage};
use zeroize::{Zeroize, ZeroizeOnDrop};

use self::{
    chains::{RatchetState, ReceiverChain, SenderChain, SkippedMessageKey},
    handshake::{SessionKeys, inbound_secret, outbound_secret},
};
use crate::{
    account::{Account, SignedPreKey},
    config::SessionConfig,
    env::{Environment, require_random, take_32},
    error::{OlmError, Result},
    pickle::{PickleKey, open, seal},
    session_id::SessionId,
};

/// Random bytes needed by [`Session::create_outbound_with_random`]
pub const OUTBOUND_RANDOM_LENGTH: usize = 64;

const SESSION_PICKLE_VERSION: u32 = 1;

/// A double ratchet session with one peer device.
#[derive(Clone)]
pub struct Session {
    session_keys: SessionKeys,
    ratchet: RatchetState,
    is_outbound: bool,
    received_message: bool,
}

impl Session {
    /// Start a session with a peer from their published keys.
    ///
    /// `random` must hold [`OUTBOUND_RANDOM_LENGTH`] bytes: 32 for the base
    /// key, 32 for the first ratchet key.
    ///
    /// # Errors
    ///
    /// - `OlmError::InsufficientRandomness` if `random` is short
    /// - `OlmError::BadSignature` if `their_prekey` is not signed by
    ///   `their_signing_key`
    pub fn create_outbound_with_random(
        account: &Account,
        their_identity_key: Curve25519PublicKey,
        their_signing_key: &Ed25519PublicKey,
        their_prekey: &SignedPreKey,
        their_one_time_key: Option<Curve25519PublicKey>,
        random: &[u8],
    ) -> Result<Self> {
        require_random(random, OUTBOUND_RANDOM_LENGTH)?;
        their_prekey.verify(their_signing_key)?;

        let base_key = Curve25519KeyPair::from_secret_bytes(take_32(random, 0));
        let ratchet_key = Curve25519KeyPair::from_secret_bytes(take_32(random, 32));

        let secret = outbound_secret(
            account.identity_secret(),
            base_key.secret_key(),
            &their_identity_key,
            &their_prekey.public_key,
            their_one_time_key.as_ref(),
        );
        let (root_key, chain_key) = derive_initial_keys(&secret);

        let session = Self {
            session_keys: SessionKeys {
                identity_key: account.identity_keys().curve25519,
                base_key: base_key.public_key(),
                one_time_key: their_one_time_key,
                prekey: their_prekey.public_key,
            },
            ratchet: RatchetState::outbound(root_key, chain_key, ratchet_key),
            is_outbound: true,
            received_message: false,
        };

        tracing::debug!(
            session_id = %session.session_id(),
            one_time_key = their_one_time_key.is_some(),
            "created outbound session"
        );
        Ok(session)
    }

    /// Start a session with a peer, drawing randomness from `env`.
    pub fn create_outbound<E: Environment>(
        env: &E,
        account: &Account,
        their_identity_key: Curve25519PublicKey,
        their_signing_key: &Ed25519PublicKey,
        their_prekey: &SignedPreKey,
        their_one_time_key: Option<Curve25519PublicKey>,
    ) -> Result<Self> {
        let mut random = [0u8; OUTBOUND_RANDOM_LENGTH];
        env.random_bytes(&mut random);
        let result = Self::create_outbound_with_random(
            account,
            their_identity_key,
            their_signing_key,
            their_prekey,
            their_one_time_key,
            &random,
        );
        random.zeroize();
        result
    }

    /// Accept a session from the first (prekey) message a peer sent.
    ///
    /// The session is created but the message is not consumed; pass it to
    /// [`Session::decrypt`] next. Removing the claimed one-time key from the
    /// account is the caller's job, once decryption succeeded.
    ///
    /// # Errors
    ///
    /// - `OlmError::BadMessageFormat` / `OlmError::BadMessageVersion` if the
    ///   message does not parse
    /// - `OlmError::BadMessageKeyId` if it names a prekey or one-time key the
    ///   account does not hold
    pub fn create_inbound(account: &Account, message: &[u8]) -> Result<Self> {
        let prekey_message = PreKeyMessage::decode(message)?;
        Self::from_prekey_message(account, &prekey_message)
    }

    /// Like [`Session::create_inbound`], but also require the message to come
    /// from `their_identity_key`.
    pub fn create_inbound_from(
        account: &Account,
        their_identity_key: &Curve25519PublicKey,
        message: &[u8],
    ) -> Result<Self> {
        let prekey_message = PreKeyMessage::decode(message)?;
        if prekey_message.identity_key != their_identity_key.to_bytes() {
            tracing::debug!("prekey message from unexpected identity");
            return Err(OlmError::BadMessageKeyId);
        }
        Self::from_prekey_message(account, &prekey_message)
    }

    fn from_prekey_message(account: &Account, message: &PreKeyMessage) -> Result<Self> {
        let inner = Message::decode(&message.message)?;

        let session_keys = SessionKeys {
            identity_key: Curve25519PublicKey::from_bytes(message.identity_key),
            base_key: Curve25519PublicKey::from_bytes(message.base_key),
            one_time_key: message.one_time_key.map(Curve25519PublicKey::from_bytes),
            prekey: Curve25519PublicKey::from_bytes(message.prekey),
        };

        let prekey = account.find_prekey(&session_keys.prekey).ok_or(OlmError::BadMessageKeyId)?;
        let one_time_key = match &session_keys.one_time_key {
            Some(key) => Some(account.find_one_time_key(key).ok_or(OlmError::BadMessageKeyId)?),
            None => None,
        };

        let secret = inbound_secret(
            account.identity_secret(),
            prekey,
            one_time_key,
            &session_keys.identity_key,
            &session_keys.base_key,
        );
        let (root_key, chain_key) = derive_initial_keys(&secret);
        let their_ratchet_key = Curve25519PublicKey::from_bytes(inner.message.ratchet_key);

        let session = Self {
            session_keys,
            ratchet: RatchetState::inbound(root_key, chain_key, their_ratchet_key),
            is_outbound: false,
            received_message: false,
        };

        tracing::debug!(session_id = %session.session_id(), "created inbound session");
        Ok(session)
    }

    /// Replace the reordering limits.
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.ratchet.config = config;
        self
    }

    /// Reordering limits in effect.
    pub fn config(&self) -> SessionConfig {
        self.ratchet.config
    }

    /// Identifier shared by both ends of the session.
    pub fn session_id(&self) -> SessionId {
        self.session_keys.session_id()
    }

    /// Whether any message from the peer has been decrypted.
    pub fn has_received_message(&self) -> bool {
        self.received_message
    }

    /// Whether the next encryption must start a new sending chain.
    pub fn is_sender_chain_empty(&self) -> bool {
        self.ratchet.sender_chain.is_none()
    }

    /// One-time or fallback key this inbound session was created with.
    ///
    /// `None` for outbound sessions and for sessions created from a prekey
    /// alone.
    pub fn one_time_key_used(&self) -> Option<Curve25519PublicKey> {
        if self.is_outbound { None } else { self.session_keys.one_time_key }
    }

    /// Type the next [`Session::encrypt`] will produce.
    pub fn encrypt_message_type(&self) -> MessageType {
        if self.is_outbound && !self.received_message && self.ratchet.sender_index() == Some(0) {
            MessageType::PreKey
        } else {
            MessageType::Normal
        }
    }

    /// Random bytes the next [`Session::encrypt_with_random`] needs.
    pub fn encrypt_random_length(&self) -> usize {
        self.ratchet.encrypt_random_length()
    }

    /// Encrypt `plaintext` for the peer.
    ///
    /// `random` must hold at least [`Session::encrypt_random_length`] bytes;
    /// it is only read when a new sending chain starts.
    pub fn encrypt_with_random(
        &mut self,
        plaintext: &[u8],
        random: &[u8],
    ) -> Result<(MessageType, Vec<u8>)> {
        require_random(random, self.encrypt_random_length())?;

        let message_type = self.encrypt_message_type();
        let message = self.ratchet.encrypt(plaintext, random)?;

        let bytes = match message_type {
            MessageType::PreKey => PreKeyMessage {
                one_time_key: self.session_keys.one_time_key.map(Curve25519PublicKey::to_bytes),
                base_key: self.session_keys.base_key.to_bytes(),
                identity_key: self.session_keys.identity_key.to_bytes(),
                prekey: self.session_keys.prekey.to_bytes(),
                message,
            }
            .encode(),
            MessageType::Normal => message,
        };

        Ok((message_type, bytes))
    }

    /// Encrypt `plaintext`, drawing any randomness from `env`.
    pub fn encrypt<E: Environment>(
        &mut self,
        env: &E,
        plaintext: &[u8],
    ) -> Result<(MessageType, Vec<u8>)> {
        let mut random = vec![0u8; self.encrypt_random_length()];
        env.random_bytes(&mut random);
        let result = self.encrypt_with_random(plaintext, &random);
        random.zeroize();
        result
    }

    /// Decrypt a message, tolerating reordering inside the skip window.
    ///
    /// # Errors
    ///
    /// - `OlmError::BadMessageMac` if authentication fails
    /// - `OlmError::UnknownMessageIndex` if the message key was already used
    ///   or evicted
    /// - `OlmError::MessageGapTooLarge` if the message is further ahead than
    ///   `max_message_gap`
    pub fn decrypt(&mut self, message_type: MessageType, message: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_message(message_type, message, false)
    }

    /// Decrypt a message that must be the next one on its chain.
    ///
    /// Shares state with [`Session::decrypt`]; the two may be interleaved.
    ///
    /// # Errors
    ///
    /// - `OlmError::OutOfOrderMessage` if the message is not the next one
    /// - the errors of [`Session::decrypt`] otherwise
    pub fn decrypt_sequential(
        &mut self,
        message_type: MessageType,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        self.decrypt_message(message_type, message, true)
    }

    fn decrypt_message(
        &mut self,
        message_type: MessageType,
        message: &[u8],
        sequential: bool,
    ) -> Result<Vec<u8>> {
        let prekey_message;
        let bytes = match message_type {
            MessageType::PreKey => {
                prekey_message = PreKeyMessage::decode(message)?;
                prekey_message.message.as_slice()
            },
            MessageType::Normal => message,
        };

        let parsed = Message::decode(bytes)?;
        let plaintext = self.ratchet.decrypt(&parsed, sequential)?;
        self.received_message = true;
        Ok(plaintext)
    }

    /// Whether a prekey message belongs to this session's handshake.
    ///
    /// Used to route a retried first message to the session it already
    /// created instead of creating a second one.
    pub fn matches_inbound(&self, message: &[u8]) -> Result<bool> {
        let prekey_message = PreKeyMessage::decode(message)?;
        Ok(self.matches(&prekey_message))
    }

    /// Like [`Session::matches_inbound`], but also require the sender's
    /// identity key to be `their_identity_key`.
    pub fn matches_inbound_from(
        &self,
        their_identity_key: &Curve25519PublicKey,
        message: &[u8],
    ) -> Result<bool> {
        let prekey_message = PreKeyMessage::decode(message)?;
        let same_sender = prekey_message.identity_key == their_identity_key.to_bytes();
        Ok(same_sender && self.matches(&prekey_message))
    }

    fn matches(&self, message: &PreKeyMessage) -> bool {
        let keys = &self.session_keys;
        message.base_key == keys.base_key.to_bytes()
            && message.identity_key == keys.identity_key.to_bytes()
            && message.prekey == keys.prekey.to_bytes()
            && message.one_time_key == keys.one_time_key.map(Curve25519PublicKey::to_bytes)
    }

    /// Chain indices and skipped key count for debugging. Contains no key
    /// material.
    pub fn describe(&self) -> String {
        self.ratchet.describe()
    }

    /// Encrypt the session's full state under `key`.
    pub fn pickle(&self, key: &PickleKey) -> Vec<u8> {
        seal(&SessionPickle::from(self), SESSION_PICKLE_VERSION, key)
    }

    /// Restore a session from [`Session::pickle`] output.
    pub fn from_pickle(blob: &[u8], key: &PickleKey) -> Result<Self> {
        let pickle: SessionPickle = open(blob, SESSION_PICKLE_VERSION, key)?;
        Ok(Self::from(&pickle))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id())
            .field("is_outbound", &self.is_outbound)
            .field("received_message", &self.received_message)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct SessionPickle {
    identity_key: [u8; 32],
    base_key: [u8; 32],
    one_time_key: Option<[u8; 32]>,
    prekey: [u8; 32],
    root_key: [u8; 32],
    sender_chain: Option<SenderChainPickle>,
    receiver_chains: Vec<ChainPickle>,
    skipped_keys: Vec<ChainPickle>,
    is_outbound: bool,
    received_message: bool,
    max_receiver_chains: u32,
    max_skipped_message_keys: u32,
    max_message_gap: u32,
}

#[derive(Serialize, Deserialize, Zeroize)]
struct SenderChainPickle {
    ratchet_secret: [u8; 32],
    chain_key: [u8; 32],
    index: u32,
}

/// A peer ratchet key with a chain key or skipped message key.
#[derive(Serialize, Deserialize, Zeroize)]
struct ChainPickle {
    ratchet_key: [u8; 32],
    key: [u8; 32],
    index: u32,
}

impl From<&Session> for SessionPickle {
    fn from(session: &Session) -> Self {
        let keys = &session.session_keys;
        let ratchet = &session.ratchet;
        Self {
            identity_key: keys.identity_key.to_bytes(),
            base_key: keys.base_key.to_bytes(),
            one_time_key: keys.one_time_key.map(Curve25519PublicKey::to_bytes),
            prekey: keys.prekey.to_bytes(),
            root_key: *ratchet.root_key.as_bytes(),
            sender_chain: ratchet.sender_chain.as_ref().map(|chain| SenderChainPickle {
                ratchet_secret: chain.ratchet_key.secret_key().to_bytes(),
                chain_key: *chain.chain_key.as_bytes(),
                index: chain.chain_key.index(),
            }),
            receiver_chains: ratchet
                .receiver_chains
                .iter()
                .map(|chain| ChainPickle {
                    ratchet_key: chain.ratchet_key.to_bytes(),
                    key: *chain.chain_key.as_bytes(),
                    index: chain.chain_key.index(),
                })
                .collect(),
            skipped_keys: ratchet
                .skipped_keys
                .iter()
                .map(|skipped| ChainPickle {
                    ratchet_key: skipped.ratchet_key.to_bytes(),
                    key: *skipped.message_key.as_bytes(),
                    index: skipped.message_key.index(),
                })
                .collect(),
            is_outbound: session.is_outbound,
            received_message: session.received_message,
            max_receiver_chains: ratchet.config.max_receiver_chains as u32,
            max_skipped_message_keys: ratchet.config.max_skipped_message_keys as u32,
            max_message_gap: ratchet.config.max_message_gap,
        }
    }
}

impl From<&SessionPickle> for Session {
    fn from(pickle: &SessionPickle) -> Self {
        let ratchet = RatchetState {
            root_key: RootKey::from_bytes(pickle.root_key),
            sender_chain: pickle.sender_chain.as_ref().map(|chain| SenderChain {
                ratchet_key: Curve25519KeyPair::from_secret_bytes(chain.ratchet_secret),
                chain_key: ChainKey::from_parts(chain.chain_key, chain.index),
            }),
            receiver_chains: pickle
                .receiver_chains
                .iter()
                .map(|chain| ReceiverChain {
                    ratchet_key: Curve25519PublicKey::from_bytes(chain.ratchet_key),
                    chain_key: ChainKey::from_parts(chain.key, chain.index),
                })
                .collect(),
            skipped_keys: pickle
                .skipped_keys
                .iter()
                .map(|skipped| SkippedMessageKey {
                    ratchet_key: Curve25519PublicKey::from_bytes(skipped.ratchet_key),
                    message_key: MessageKey::from_parts(skipped.key, skipped.index),
                })
                .collect(),
            config: SessionConfig {
                max_receiver_chains: pickle.max_receiver_chains as usize,
                max_skipped_message_keys: pickle.max_skipped_message_keys as usize,
                max_message_gap: pickle.max_message_gap,
            },
        };

        Self {
            session_keys: SessionKeys {
                identity_key: Curve25519PublicKey::from_bytes(pickle.identity_key),
                base_key: Curve25519PublicKey::from_bytes(pickle.base_key),
                one_time_key: pickle.one_time_key.map(Curve25519PublicKey::from_bytes),
                prekey: Curve25519PublicKey::from_bytes(pickle.prekey),
            },
            ratchet,
            is_outbound: pickle.is_outbound,
            received_message: pickle.received_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair {
        alice: Account,
        bob: Account,
        bob_prekey: SignedPreKey,
        bob_one_time_key: Curve25519PublicKey,
    }

    fn accounts() -> Pair {
        let alice = Account::new_with_random(&[1u8; 64]).unwrap();
        let mut bob = Account::new_with_random(&[2u8; 64]).unwrap();
        let bob_prekey = bob.generate_prekey_with_random(&[3u8; 32]).unwrap();
        bob.generate_one_time_keys_with_random(1, &[4u8; 32]).unwrap();
        let bob_one_time_key = *bob.one_time_keys().values().next().unwrap();
        Pair { alice, bob, bob_prekey, bob_one_time_key }
    }

    fn outbound(pair: &Pair) -> Session {
        let bob_keys = pair.bob.identity_keys();
        Session::create_outbound_with_random(
            &pair.alice,
            bob_keys.curve25519,
            &bob_keys.ed25519,
            &pair.bob_prekey,
            Some(pair.bob_one_time_key),
            &[5u8; 64],
        )
        .unwrap()
    }

    #[test]
    fn both_ends_share_session_id() {
        let pair = accounts();
        let mut alice = outbound(&pair);
        let (message_type, bytes) = alice.encrypt_with_random(b"hello", &[]).unwrap();
        assert_eq!(message_type, MessageType::PreKey);

        let mut bob = Session::create_inbound(&pair.bob, &bytes).unwrap();
        assert_eq!(bob.session_id(), alice.session_id());
        assert_eq!(bob.decrypt(message_type, &bytes).unwrap(), b"hello");
        assert!(bob.has_received_message());
        assert_eq!(bob.one_time_key_used(), Some(pair.bob_one_time_key));
        assert_eq!(alice.one_time_key_used(), None);
    }

    #[test]
    fn only_first_message_is_prekey() {
        let pair = accounts();
        let mut alice = outbound(&pair);
        assert_eq!(alice.encrypt_message_type(), MessageType::PreKey);
        alice.encrypt_with_random(b"one", &[]).unwrap();
        assert_eq!(alice.encrypt_message_type(), MessageType::Normal);
        let (message_type, _) = alice.encrypt_with_random(b"two", &[]).unwrap();
        assert_eq!(message_type, MessageType::Normal);
    }

    #[test]
    fn outbound_rejects_forged_prekey_signature() {
        let pair = accounts();
        let bob_keys = pair.bob.identity_keys();
        let forged = SignedPreKey { signature: pair.alice.sign(b"forged"), ..pair.bob_prekey };

        let result = Session::create_outbound_with_random(
            &pair.alice,
            bob_keys.curve25519,
            &bob_keys.ed25519,
            &forged,
            None,
            &[5u8; 64],
        );
        assert!(matches!(result, Err(OlmError::BadSignature)));
    }

    #[test]
    fn outbound_rejects_short_randomness() {
        let pair = accounts();
        let bob_keys = pair.bob.identity_keys();
        let result = Session::create_outbound_with_random(
            &pair.alice,
            bob_keys.curve25519,
            &bob_keys.ed25519,
            &pair.bob_prekey,
            None,
            &[5u8; 32],
        );
        assert!(matches!(result, Err(OlmError::InsufficientRandomness { needed: 64, got: 32 })));
    }

    #[test]
    fn inbound_rejects_unknown_one_time_key() {
        let mut pair = accounts();
        let mut alice = outbound(&pair);
        let (_, bytes) = alice.encrypt_with_random(b"hello", &[]).unwrap();

        let session = Session::create_inbound(&pair.bob, &bytes).unwrap();
        pair.bob.remove_one_time_keys(&session).unwrap();

        assert!(matches!(
            Session::create_inbound(&pair.bob, &bytes),
            Err(OlmError::BadMessageKeyId)
        ));
    }

    #[test]
    fn inbound_from_checks_identity() {
        let pair = accounts();
        let mut alice = outbound(&pair);
        let (_, bytes) = alice.encrypt_with_random(b"hello", &[]).unwrap();

        let alice_identity = pair.alice.identity_keys().curve25519;
        let bob_identity = pair.bob.identity_keys().curve25519;
        assert!(Session::create_inbound_from(&pair.bob, &alice_identity, &bytes).is_ok());
        assert!(matches!(
            Session::create_inbound_from(&pair.bob, &bob_identity, &bytes),
            Err(OlmError::BadMessageKeyId)
        ));
    }

    #[test]
    fn matches_inbound_recognizes_own_handshake() {
        let pair = accounts();
        let mut alice = outbound(&pair);
        let (_, bytes) = alice.encrypt_with_random(b"hello", &[]).unwrap();
        let bob = Session::create_inbound(&pair.bob, &bytes).unwrap();

        let alice_identity = pair.alice.identity_keys().curve25519;
        assert!(bob.matches_inbound(&bytes).unwrap());
        assert!(bob.matches_inbound_from(&alice_identity, &bytes).unwrap());
        assert!(!bob.matches_inbound_from(&pair.bob.identity_keys().curve25519, &bytes).unwrap());

        let mut other = Session::create_outbound_with_random(
            &pair.alice,
            pair.bob.identity_keys().curve25519,
            &pair.bob.identity_keys().ed25519,
            &pair.bob_prekey,
            Some(pair.bob_one_time_key),
            &[6u8; 64],
        )
        .unwrap();
        let (_, other_bytes) = other.encrypt_with_random(b"hello", &[]).unwrap();
        assert!(!bob.matches_inbound(&other_bytes).unwrap());
    }

    #[test]
    fn reply_requires_randomness() {
        let pair = accounts();
        let mut alice = outbound(&pair);
        let (message_type, bytes) = alice.encrypt_with_random(b"hello", &[]).unwrap();
        let mut bob = Session::create_inbound(&pair.bob, &bytes).unwrap();
        bob.decrypt(message_type, &bytes).unwrap();

        assert!(bob.is_sender_chain_empty());
        assert_eq!(bob.encrypt_random_length(), 32);
        assert!(matches!(
            bob.encrypt_with_random(b"hi", &[]),
            Err(OlmError::InsufficientRandomness { needed: 32, got: 0 })
        ));

        let (reply_type, reply) = bob.encrypt_with_random(b"hi", &[7u8; 32]).unwrap();
        assert_eq!(reply_type, MessageType::Normal);
        assert_eq!(alice.decrypt(reply_type, &reply).unwrap(), b"hi");
        assert!(alice.is_sender_chain_empty());
    }

    #[test]
    fn pickle_preserves_ratchet_trajectory() {
        let pair = accounts();
        let mut alice = outbound(&pair);
        alice.encrypt_with_random(b"one", &[]).unwrap();

        let key = PickleKey::from_bytes([8u8; 32]);
        let mut restored = Session::from_pickle(&alice.pickle(&key), &key).unwrap();

        assert_eq!(restored.session_id(), alice.session_id());
        assert_eq!(
            restored.encrypt_with_random(b"two", &[]).unwrap(),
            alice.encrypt_with_random(b"two", &[]).unwrap()
        );
    }

    #[test]
    fn pickle_preserves_config() {
        let pair = accounts();
        let config = SessionConfig { max_message_gap: 10, ..SessionConfig::default() };
        let alice = outbound(&pair).with_config(config);

        let key = PickleKey::from_bytes([8u8; 32]);
        let restored = Session::from_pickle(&alice.pickle(&key), &key).unwrap();
        assert_eq!(restored.config(), config);
    }
}
