//! Double ratchet state: root key, sending chain, receiving chains and
//! skipped message keys.
//!
//! # Invariants
//!
//! - Receiving chains are ordered newest first and never exceed
//!   `max_receiver_chains`
//! - Skipped keys are ordered oldest first and never exceed
//!   `max_skipped_message_keys`
//! - A failed decryption leaves the state untouched
//! - A message key is used for at most one successful decryption

use std::collections::VecDeque;

use tether_crypto::{ChainKey, Curve25519KeyPair, Curve25519PublicKey, MessageKey, RootKey};
use tether_proto::{MacedMessage, Message};

use crate::{
    config::SessionConfig,
    env::take_32,
    error::{OlmError, Result},
};

/// Our current ratchet key pair and the chain it keys.
#[derive(Clone)]
pub(crate) struct SenderChain {
    pub ratchet_key: Curve25519KeyPair,
    pub chain_key: ChainKey,
}

/// A peer ratchet key and the chain derived from it.
#[derive(Clone)]
pub(crate) struct ReceiverChain {
    pub ratchet_key: Curve25519PublicKey,
    pub chain_key: ChainKey,
}

/// Message key stored while a receiving chain advanced past it.
#[derive(Clone)]
pub(crate) struct SkippedMessageKey {
    pub ratchet_key: Curve25519PublicKey,
    pub message_key: MessageKey,
}

/// Everything a session mutates while encrypting and decrypting.
#[derive(Clone)]
pub(crate) struct RatchetState {
    pub root_key: RootKey,
    pub sender_chain: Option<SenderChain>,
    pub receiver_chains: VecDeque<ReceiverChain>,
    pub skipped_keys: VecDeque<SkippedMessageKey>,
    pub config: SessionConfig,
}

impl RatchetState {
    /// State right after the initiator's handshake: sending only.
    pub fn outbound(
        root_key: RootKey,
        chain_key: ChainKey,
        ratchet_key: Curve25519KeyPair,
    ) -> Self {
        Self {
            root_key,
            sender_chain: Some(SenderChain { ratchet_key, chain_key }),
            receiver_chains: VecDeque::new(),
            skipped_keys: VecDeque::new(),
            config: SessionConfig::default(),
        }
    }

    /// State right after the responder's handshake: receiving only.
    pub fn inbound(
        root_key: RootKey,
        chain_key: ChainKey,
        their_ratchet_key: Curve25519PublicKey,
    ) -> Self {
        let mut receiver_chains = VecDeque::new();
        receiver_chains.push_front(ReceiverChain { ratchet_key: their_ratchet_key, chain_key });
        Self {
            root_key,
            sender_chain: None,
            receiver_chains,
            skipped_keys: VecDeque::new(),
            config: SessionConfig::default(),
        }
    }

    /// Random bytes the next [`RatchetState::encrypt`] consumes.
    pub fn encrypt_random_length(&self) -> usize {
        if self.sender_chain.is_some() { 0 } else { 32 }
    }

    /// Index of the next message key on the sending chain.
    pub fn sender_index(&self) -> Option<u32> {
        self.sender_chain.as_ref().map(|chain| chain.chain_key.index())
    }

    /// Encrypt `plaintext` on the sending chain and encode it with its MAC.
    ///
    /// Starts a new sending chain from `random` if the previous one was
    /// dropped by a DH ratchet step. The caller checks `random` holds
    /// [`RatchetState::encrypt_random_length`] bytes.
    pub fn encrypt(&mut self, plaintext: &[u8], random: &[u8]) -> Result<Vec<u8>> {
        if self.sender_chain.is_none() {
            self.start_sender_chain(random)?;
        }
        let Some(chain) = &mut self.sender_chain else {
            unreachable!("sender chain was just created");
        };

        let message_key = chain.chain_key.next_message_key()?;
        let keys = message_key.cipher_keys();
        let message = Message {
            ratchet_key: chain.ratchet_key.public_key().to_bytes(),
            counter: message_key.index(),
            ciphertext: keys.encrypt(plaintext),
        };

        tracing::trace!(counter = message.counter, len = plaintext.len(), "encrypted message");
        Ok(message.encode(|body| keys.mac(body)))
    }

    fn start_sender_chain(&mut self, random: &[u8]) -> Result<()> {
        // An inbound session always holds the chain it was created from.
        let Some(latest) = self.receiver_chains.front() else {
            return Err(OlmError::UnknownKey);
        };

        let ratchet_key = Curve25519KeyPair::from_secret_bytes(take_32(random, 0));
        let (root_key, chain_key) =
            self.root_key.advance(ratchet_key.secret_key(), &latest.ratchet_key);
        self.root_key = root_key;
        self.sender_chain = Some(SenderChain { ratchet_key, chain_key });

        tracing::debug!("started new sending chain");
        Ok(())
    }

    /// Decrypt a parsed message, committing state changes only on success.
    ///
    /// With `sequential` set, the message must carry exactly the next index
    /// of its chain; reordered or replayed messages fail with
    /// `OutOfOrderMessage`.
    pub fn decrypt(&mut self, message: &MacedMessage<'_>, sequential: bool) -> Result<Vec<u8>> {
        let mut next = self.clone();
        let plaintext = next.decrypt_in_place(message, sequential)?;
        *self = next;
        Ok(plaintext)
    }

    fn decrypt_in_place(
        &mut self,
        message: &MacedMessage<'_>,
        sequential: bool,
    ) -> Result<Vec<u8>> {
        let ratchet_key = Curve25519PublicKey::from_bytes(message.message.ratchet_key);
        let counter = message.message.counter;
        let limit = self.config.max_message_gap;

        let known = self.receiver_chains.iter().position(|chain| chain.ratchet_key == ratchet_key);
        let position = match known {
            Some(position) => position,
            None => {
                self.ratchet_step(ratchet_key, counter)?;
                0
            },
        };

        let chain = &mut self.receiver_chains[position];
        let expected = chain.chain_key.index();

        if counter < expected {
            if sequential {
                return Err(OlmError::OutOfOrderMessage { expected, received: counter });
            }
            return self.decrypt_with_skipped_key(ratchet_key, message);
        }
        if sequential && counter != expected {
            return Err(OlmError::OutOfOrderMessage { expected, received: counter });
        }

        let gap = counter - expected;
        if gap > limit {
            return Err(OlmError::MessageGapTooLarge { gap, limit });
        }

        let skipped = chain.chain_key.skip_to(counter)?;
        let message_key = chain.chain_key.next_message_key()?;
        let plaintext = open(&message_key, message)?;

        for message_key in skipped {
            self.store_skipped_key(SkippedMessageKey { ratchet_key, message_key });
        }

        tracing::trace!(counter, gap, "decrypted message");
        Ok(plaintext)
    }

    /// Start a receiving chain for a ratchet key we have not seen.
    fn ratchet_step(&mut self, their_ratchet_key: Curve25519PublicKey, counter: u32) -> Result<()> {
        // A new peer ratchet key answers our sending chain; without one there
        // is nothing it could have been derived from.
        let Some(sender_chain) = &self.sender_chain else {
            return Err(OlmError::BadMessageMac);
        };

        let limit = self.config.max_message_gap;
        if counter > limit {
            return Err(OlmError::MessageGapTooLarge { gap: counter, limit });
        }

        let (root_key, chain_key) =
            self.root_key.advance(sender_chain.ratchet_key.secret_key(), &their_ratchet_key);
        self.root_key = root_key;
        self.sender_chain = None;
        self.receiver_chains
            .push_front(ReceiverChain { ratchet_key: their_ratchet_key, chain_key });

        while self.receiver_chains.len() > self.config.max_receiver_chains.max(1) {
            self.receiver_chains.pop_back();
            tracing::debug!(
                limit = self.config.max_receiver_chains,
                "evicted oldest receiving chain"
            );
        }

        tracing::debug!(chains = self.receiver_chains.len(), "performed DH ratchet step");
        Ok(())
    }

    fn decrypt_with_skipped_key(
        &mut self,
        ratchet_key: Curve25519PublicKey,
        message: &MacedMessage<'_>,
    ) -> Result<Vec<u8>> {
        let counter = message.message.counter;
        let position = self
            .skipped_keys
            .iter()
            .position(|key| key.ratchet_key == ratchet_key && key.message_key.index() == counter)
            .ok_or(OlmError::UnknownMessageIndex { index: counter })?;

        let plaintext = open(&self.skipped_keys[position].message_key, message)?;
        self.skipped_keys.remove(position);

        tracing::trace!(counter, "decrypted message with skipped key");
        Ok(plaintext)
    }

    fn store_skipped_key(&mut self, key: SkippedMessageKey) {
        self.skipped_keys.push_back(key);
        if self.skipped_keys.len() > self.config.max_skipped_message_keys {
            self.skipped_keys.pop_front();
            tracing::debug!(
                limit = self.config.max_skipped_message_keys,
                "evicted oldest skipped key"
            );
        }
    }

    /// Chain indices and skipped key count, without key material.
    pub fn describe(&self) -> String {
        let sender = self
            .sender_index()
            .map_or_else(|| "none".to_owned(), |index| index.to_string());
        let receivers: Vec<String> =
            self.receiver_chains.iter().map(|chain| chain.chain_key.index().to_string()).collect();

        format!(
            "sender chain index: {sender} receiver chain indices: [{}] skipped message keys: {}",
            receivers.join(", "),
            self.skipped_keys.len()
        )
    }
}

/// Verify the MAC under `message_key`, then decrypt.
fn open(message_key: &MessageKey, message: &MacedMessage<'_>) -> Result<Vec<u8>> {
    let keys = message_key.cipher_keys();
    if keys.verify_mac(message.body, message.mac).is_err() {
        tracing::warn!(counter = message.message.counter, "message authentication failed");
        return Err(OlmError::BadMessageMac);
    }
    Ok(keys.decrypt(&message.message.ciphertext)?)
}

#[cfg(test)]
mod tests {
    use tether_crypto::derive_initial_keys;

    use super::*;

    fn pair() -> (RatchetState, RatchetState) {
        let (root, chain) = derive_initial_keys(b"shared secret for both sides");
        let alice_ratchet = Curve25519KeyPair::from_secret_bytes([7u8; 32]);
        let their_ratchet = alice_ratchet.public_key();
        let alice = RatchetState::outbound(root.clone(), chain.clone(), alice_ratchet);
        let bob = RatchetState::inbound(root, chain, their_ratchet);
        (alice, bob)
    }

    fn decrypt(state: &mut RatchetState, bytes: &[u8], sequential: bool) -> Result<Vec<u8>> {
        let message = Message::decode(bytes)?;
        state.decrypt(&message, sequential)
    }

    #[test]
    fn first_message_decrypts() {
        let (mut alice, mut bob) = pair();
        let bytes = alice.encrypt(b"hello", &[]).unwrap();
        assert_eq!(decrypt(&mut bob, &bytes, false).unwrap(), b"hello");
    }

    #[test]
    fn reply_starts_new_chains() {
        let (mut alice, mut bob) = pair();
        let bytes = alice.encrypt(b"hello", &[]).unwrap();
        decrypt(&mut bob, &bytes, false).unwrap();

        assert_eq!(bob.encrypt_random_length(), 32);
        let reply = bob.encrypt(b"hi", &[9u8; 32]).unwrap();
        assert_eq!(decrypt(&mut alice, &reply, false).unwrap(), b"hi");

        assert!(alice.sender_chain.is_none());
        assert_eq!(alice.receiver_chains.len(), 1);
        assert_eq!(alice.encrypt_random_length(), 32);
    }

    #[test]
    fn reordered_messages_use_skipped_keys() {
        let (mut alice, mut bob) = pair();
        let first = alice.encrypt(b"one", &[]).unwrap();
        let second = alice.encrypt(b"two", &[]).unwrap();
        let third = alice.encrypt(b"three", &[]).unwrap();

        assert_eq!(decrypt(&mut bob, &third, false).unwrap(), b"three");
        assert_eq!(bob.skipped_keys.len(), 2);
        assert_eq!(decrypt(&mut bob, &first, false).unwrap(), b"one");
        assert_eq!(decrypt(&mut bob, &second, false).unwrap(), b"two");
        assert!(bob.skipped_keys.is_empty());
    }

    #[test]
    fn replay_fails_once_key_is_consumed() {
        let (mut alice, mut bob) = pair();
        let first = alice.encrypt(b"one", &[]).unwrap();
        decrypt(&mut bob, &first, false).unwrap();

        assert_eq!(
            decrypt(&mut bob, &first, false),
            Err(OlmError::UnknownMessageIndex { index: 0 })
        );
    }

    #[test]
    fn sequential_rejects_gaps_without_changing_state() {
        let (mut alice, mut bob) = pair();
        let first = alice.encrypt(b"one", &[]).unwrap();
        let second = alice.encrypt(b"two", &[]).unwrap();

        assert_eq!(
            decrypt(&mut bob, &second, true),
            Err(OlmError::OutOfOrderMessage { expected: 0, received: 1 })
        );
        assert_eq!(decrypt(&mut bob, &first, true).unwrap(), b"one");
        assert_eq!(decrypt(&mut bob, &second, true).unwrap(), b"two");
    }

    #[test]
    fn skipped_keys_are_bounded() {
        let (mut alice, mut bob) = pair();
        bob.config.max_skipped_message_keys = 3;

        let messages: Vec<_> = (0..6).map(|i| alice.encrypt(&[i], &[]).unwrap()).collect();
        decrypt(&mut bob, &messages[5], false).unwrap();

        assert_eq!(bob.skipped_keys.len(), 3);
        assert_eq!(
            decrypt(&mut bob, &messages[0], false),
            Err(OlmError::UnknownMessageIndex { index: 0 })
        );
        assert_eq!(decrypt(&mut bob, &messages[4], false).unwrap(), vec![4]);
    }

    #[test]
    fn gap_beyond_limit_is_rejected() {
        let (mut alice, mut bob) = pair();
        bob.config.max_message_gap = 2;

        let messages: Vec<_> = (0..4).map(|i| alice.encrypt(&[i], &[]).unwrap()).collect();
        assert_eq!(
            decrypt(&mut bob, &messages[3], false),
            Err(OlmError::MessageGapTooLarge { gap: 3, limit: 2 })
        );
        assert_eq!(decrypt(&mut bob, &messages[2], false).unwrap(), vec![2]);
    }

    #[test]
    fn tampered_message_leaves_state_unchanged() {
        let (mut alice, mut bob) = pair();
        let mut bytes = alice.encrypt(b"hello", &[]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let before = bob.describe();
        assert_eq!(decrypt(&mut bob, &bytes, false), Err(OlmError::BadMessageMac));
        assert_eq!(bob.describe(), before);
    }

    #[test]
    fn unknown_ratchet_key_without_sender_chain_fails() {
        let (_, mut bob) = pair();
        let mut stranger = RatchetState::outbound(
            RootKey::from_bytes([1u8; 32]),
            ChainKey::from_parts([2u8; 32], 0),
            Curve25519KeyPair::from_secret_bytes([3u8; 32]),
        );
        let bytes = stranger.encrypt(b"x", &[]).unwrap();

        assert_eq!(decrypt(&mut bob, &bytes, false), Err(OlmError::BadMessageMac));
    }

    #[test]
    fn describe_reports_indices() {
        let (mut alice, mut bob) = pair();
        let _ = alice.encrypt(b"one", &[]).unwrap();
        let second = alice.encrypt(b"two", &[]).unwrap();
        decrypt(&mut bob, &second, false).unwrap();

        assert_eq!(
            bob.describe(),
            "sender chain index: none receiver chain indices: [2] skipped message keys: 1"
        );
    }
}
