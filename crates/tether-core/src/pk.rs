//! Anonymous public-key encryption.
//!
//! The sender generates an ephemeral Curve25519 key per message, agrees a
//! secret with the recipient's long-lived key and encrypts with AES-256-CBC
//! plus a truncated HMAC over the ciphertext:
//!
//! ```text
//! shared = X25519(ephemeral, recipient)
//! keys   = HKDF-SHA256(shared, info = "") → AES key | MAC key | IV
//! output = { ciphertext, mac = HMAC(ciphertext)[..8], ephemeral public key }
//! ```
//!
//! The sender is not authenticated. Anyone who later obtains the recipient's
//! private key can decrypt every message ever sent to it.

use serde::{Deserialize, Serialize};
use tether_crypto::{CipherKeys, Curve25519KeyPair, Curve25519PublicKey, MAC_LENGTH};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    env::{Environment, require_random, take_32},
    error::{OlmError, Result},
    pickle::{PickleKey, open, seal},
};

/// Random bytes needed per encryption and per generated decryption key
pub const PK_RANDOM_LENGTH: usize = 32;

const PK_INFO: &[u8] = b"";

const PK_DECRYPTION_PICKLE_VERSION: u32 = 1;

/// Output of [`PkEncryption::encrypt_with_random`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkMessage {
    /// AES-256-CBC ciphertext
    pub ciphertext: Vec<u8>,
    /// Truncated HMAC over the ciphertext
    pub mac: [u8; MAC_LENGTH],
    /// Sender's ephemeral public key
    pub ephemeral_key: Curve25519PublicKey,
}

/// Encrypts messages for one recipient public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PkEncryption {
    recipient_key: Curve25519PublicKey,
}

impl PkEncryption {
    /// Encrypt for `recipient_key`.
    pub fn new(recipient_key: Curve25519PublicKey) -> Self {
        Self { recipient_key }
    }

    /// Encrypt `plaintext` with an ephemeral key built from
    /// [`PK_RANDOM_LENGTH`] random bytes.
    pub fn encrypt_with_random(&self, plaintext: &[u8], random: &[u8]) -> Result<PkMessage> {
        require_random(random, PK_RANDOM_LENGTH)?;

        let ephemeral = Curve25519KeyPair::from_secret_bytes(take_32(random, 0));
        let keys = cipher_keys(&ephemeral, &self.recipient_key);
        let ciphertext = keys.encrypt(plaintext);
        let mac = keys.mac(&ciphertext);

        Ok(PkMessage { ciphertext, mac, ephemeral_key: ephemeral.public_key() })
    }

    /// Encrypt `plaintext` with randomness from `env`.
    pub fn encrypt<E: Environment>(&self, env: &E, plaintext: &[u8]) -> PkMessage {
        let mut random = [0u8; PK_RANDOM_LENGTH];
        env.random_bytes(&mut random);
        let result = self.encrypt_with_random(plaintext, &random);
        random.zeroize();

        let Ok(message) = result else {
            unreachable!("buffer is exactly PK_RANDOM_LENGTH bytes");
        };
        message
    }
}

/// Holds the long-lived private key messages are encrypted to.
#[derive(Clone)]
pub struct PkDecryption {
    key_pair: Curve25519KeyPair,
}

impl PkDecryption {
    /// Generate a key pair from [`PK_RANDOM_LENGTH`] random bytes.
    pub fn new_with_random(random: &[u8]) -> Result<Self> {
        require_random(random, PK_RANDOM_LENGTH)?;
        Ok(Self::from_private_key(take_32(random, 0)))
    }

    /// Generate a key pair with randomness from `env`.
    pub fn new<E: Environment>(env: &E) -> Self {
        let mut random = [0u8; PK_RANDOM_LENGTH];
        env.random_bytes(&mut random);
        let decryption = Self::from_private_key(random);
        random.zeroize();
        decryption
    }

    /// Restore from raw private key bytes.
    pub fn from_private_key(private_key: [u8; 32]) -> Self {
        Self { key_pair: Curve25519KeyPair::from_secret_bytes(private_key) }
    }

    /// Raw private key bytes.
    pub fn private_key(&self) -> [u8; 32] {
        self.key_pair.secret_key().to_bytes()
    }

    /// Public key senders encrypt to.
    pub fn public_key(&self) -> Curve25519PublicKey {
        self.key_pair.public_key()
    }

    /// Verify and decrypt a message.
    ///
    /// # Errors
    ///
    /// - `OlmError::BadMessageMac` if the MAC does not verify or the
    ///   plaintext padding is invalid
    pub fn decrypt(
        &self,
        ephemeral_key: &Curve25519PublicKey,
        mac: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let keys = cipher_keys(&self.key_pair, ephemeral_key);
        if keys.verify_mac(ciphertext, mac).is_err() {
            tracing::warn!("pk message authentication failed");
            return Err(OlmError::BadMessageMac);
        }
        Ok(keys.decrypt(ciphertext)?)
    }

    /// Decrypt a [`PkMessage`].
    pub fn decrypt_message(&self, message: &PkMessage) -> Result<Vec<u8>> {
        self.decrypt(&message.ephemeral_key, &message.mac, &message.ciphertext)
    }

    /// Encrypt the private key under `key`.
    pub fn pickle(&self, key: &PickleKey) -> Vec<u8> {
        let pickle = PkDecryptionPickle { private_key: self.private_key() };
        seal(&pickle, PK_DECRYPTION_PICKLE_VERSION, key)
    }

    /// Restore from [`PkDecryption::pickle`] output.
    pub fn from_pickle(blob: &[u8], key: &PickleKey) -> Result<Self> {
        let pickle: PkDecryptionPickle = open(blob, PK_DECRYPTION_PICKLE_VERSION, key)?;
        Ok(Self::from_private_key(pickle.private_key))
    }
}

impl std::fmt::Debug for PkDecryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkDecryption")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

fn cipher_keys(ours: &Curve25519KeyPair, theirs: &Curve25519PublicKey) -> CipherKeys {
    let shared = ours.diffie_hellman(theirs);
    CipherKeys::derive(shared.as_bytes(), PK_INFO)
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct PkDecryptionPickle {
    private_key: [u8; 32],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decryption() -> PkDecryption {
        PkDecryption::new_with_random(&[1u8; 32]).unwrap()
    }

    #[test]
    fn roundtrip() {
        let decryption = decryption();
        let encryption = PkEncryption::new(decryption.public_key());
        let message = encryption.encrypt_with_random(b"secret", &[2u8; 32]).unwrap();

        assert_eq!(decryption.decrypt_message(&message).unwrap(), b"secret");
    }

    #[test]
    fn flipped_ciphertext_bit_fails() {
        let decryption = decryption();
        let mut message = PkEncryption::new(decryption.public_key())
            .encrypt_with_random(b"secret", &[2u8; 32])
            .unwrap();
        message.ciphertext[3] ^= 0x10;

        assert_eq!(decryption.decrypt_message(&message), Err(OlmError::BadMessageMac));
    }

    #[test]
    fn flipped_mac_bit_fails() {
        let decryption = decryption();
        let mut message = PkEncryption::new(decryption.public_key())
            .encrypt_with_random(b"secret", &[2u8; 32])
            .unwrap();
        message.mac[0] ^= 0x01;

        assert_eq!(decryption.decrypt_message(&message), Err(OlmError::BadMessageMac));
    }

    #[test]
    fn wrong_recipient_fails() {
        let other = PkDecryption::new_with_random(&[9u8; 32]).unwrap();
        let message = PkEncryption::new(decryption().public_key())
            .encrypt_with_random(b"secret", &[2u8; 32])
            .unwrap();

        assert_eq!(other.decrypt_message(&message), Err(OlmError::BadMessageMac));
    }

    #[test]
    fn private_key_export_restores_decryption() {
        let decryption = decryption();
        let restored = PkDecryption::from_private_key(decryption.private_key());
        assert_eq!(restored.public_key(), decryption.public_key());

        let key = PickleKey::from_bytes([3u8; 32]);
        let unpickled = PkDecryption::from_pickle(&decryption.pickle(&key), &key).unwrap();
        assert_eq!(unpickled.public_key(), decryption.public_key());
    }
}
