//! Key schedule shared by pairwise sessions
//!
//! ```text
//! shared secret ──HKDF(OLM_ROOT)──► root key ─┬─► chain key (index 0)
//!                                             │
//! root key + DH(ratchet) ──HKDF(OLM_RATCHET)──┴─► root key', chain key'
//!
//! chain key ──HMAC(0x01)──► message key ──HKDF(OLM_KEYS)──► AES key | MAC | IV
//!     │
//!     └─HMAC(0x02)──► next chain key (old value zeroized)
//! ```
//!
//! # Security Properties
//!
//! - Forward Secrecy: a chain key is overwritten as soon as it is advanced
//! - Key Uniqueness: each index yields a distinct message key
//! - Determinism: same inputs always produce the same key sequence

use hmac::Mac;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{
    cipher::CipherKeys,
    error::CryptoError,
    kdf::{HmacSha256, hkdf_sha256},
    keys::{Curve25519PublicKey, Curve25519SecretKey},
};

/// Label used when deriving the first root key from the handshake secret
pub const ROOT_INFO: &[u8] = b"OLM_ROOT";

/// Label used for every Diffie-Hellman ratchet step
pub const RATCHET_INFO: &[u8] = b"OLM_RATCHET";

/// Label used to expand a message key into cipher keys
pub const MESSAGE_KEY_INFO: &[u8] = b"OLM_KEYS";

/// HMAC input deriving a message key from a chain key
const MESSAGE_KEY_SEED: &[u8] = &[0x01];

/// HMAC input deriving the next chain key
const CHAIN_KEY_SEED: &[u8] = &[0x02];

/// Root of the Diffie-Hellman ratchet.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RootKey([u8; 32]);

impl RootKey {
    /// Wrap raw root key bytes (used when restoring pickled state).
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw root key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Perform one Diffie-Hellman ratchet step.
    ///
    /// `(root', chain) = HKDF(salt = root, ikm = DH(our, their), info = OLM_RATCHET)`.
    /// The returned chain starts at index 0.
    pub fn advance(
        &self,
        our_ratchet_key: &Curve25519SecretKey,
        their_ratchet_key: &Curve25519PublicKey,
    ) -> (Self, ChainKey) {
        let shared = our_ratchet_key.diffie_hellman(their_ratchet_key);
        let derived: [u8; 64] = hkdf_sha256(Some(&self.0), shared.as_bytes(), RATCHET_INFO);
        split_root_and_chain(derived)
    }
}

/// Derive the first root key and chain key from the handshake secret.
pub fn derive_initial_keys(shared_secret: &[u8]) -> (RootKey, ChainKey) {
    let derived: [u8; 64] = hkdf_sha256(None, shared_secret, ROOT_INFO);
    split_root_and_chain(derived)
}

fn split_root_and_chain(mut derived: [u8; 64]) -> (RootKey, ChainKey) {
    let mut root = [0u8; 32];
    let mut chain = [0u8; 32];
    root.copy_from_slice(&derived[..32]);
    chain.copy_from_slice(&derived[32..]);
    derived.zeroize();

    (RootKey(root), ChainKey { key: chain, index: 0 })
}

/// A symmetric chain key and its position in the chain.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChainKey {
    key: [u8; 32],
    index: u32,
}

impl ChainKey {
    /// Build a chain key at a given index (used when restoring pickled state).
    pub fn from_parts(key: [u8; 32], index: u32) -> Self {
        Self { key, index }
    }

    /// Raw chain key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Index of the message key this chain key will produce next.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Derive the message key for the current index without advancing.
    pub fn message_key(&self) -> MessageKey {
        MessageKey { key: hmac(&self.key, MESSAGE_KEY_SEED), index: self.index }
    }

    /// Advance the chain by one step, overwriting the old key.
    pub fn advance(&mut self) -> Result<(), CryptoError> {
        if self.index == u32::MAX {
            return Err(CryptoError::IndexOverflow { current: self.index });
        }

        let mut next = hmac(&self.key, CHAIN_KEY_SEED);
        self.key.copy_from_slice(&next);
        next.zeroize();
        self.index += 1;

        Ok(())
    }

    /// Derive the message key for the current index, then advance.
    pub fn next_message_key(&mut self) -> Result<MessageKey, CryptoError> {
        let message_key = self.message_key();
        self.advance()?;
        Ok(message_key)
    }

    /// Advance to `target`, returning the message keys for every skipped
    /// index in ascending order.
    ///
    /// Returns an empty list when the chain is already at or past `target`.
    /// Callers bound `target - index` before calling.
    pub fn skip_to(&mut self, target: u32) -> Result<Vec<MessageKey>, CryptoError> {
        let mut skipped = Vec::with_capacity(target.saturating_sub(self.index) as usize);
        while self.index < target {
            skipped.push(self.next_message_key()?);
        }
        Ok(skipped)
    }
}

/// Single-use key protecting one message.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MessageKey {
    key: [u8; 32],
    index: u32,
}

impl MessageKey {
    /// Build a message key (used when restoring pickled skipped keys).
    pub fn from_parts(key: [u8; 32], index: u32) -> Self {
        Self { key, index }
    }

    /// Raw message key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Chain index this key was derived at.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Expand into AES key, MAC key and IV.
    pub fn cipher_keys(&self) -> CipherKeys {
        CipherKeys::derive(&self.key, MESSAGE_KEY_INFO)
    }
}

fn hmac(key: &[u8; 32], seed: &[u8]) -> [u8; 32] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(seed);
    let result = mac.finalize().into_bytes();

    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}
