//! Curve25519 and Ed25519 key types
//!
//! Thin wrappers over `x25519-dalek` and `ed25519-dalek` that fix the byte
//! lengths the rest of the crate relies on. Secret halves zeroize on drop.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::CryptoError;

/// Length of a Curve25519 public or private key
pub const CURVE25519_KEY_LENGTH: usize = 32;

/// Length of an Ed25519 public key
pub const ED25519_PUBLIC_KEY_LENGTH: usize = 32;

/// Length of an Ed25519 private seed
pub const ED25519_SEED_LENGTH: usize = 32;

/// Length of an Ed25519 signature
pub const ED25519_SIGNATURE_LENGTH: usize = 64;

/// Public half of a Curve25519 key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Curve25519PublicKey([u8; CURVE25519_KEY_LENGTH]);

impl Curve25519PublicKey {
    /// Wrap raw public key bytes.
    pub const fn from_bytes(bytes: [u8; CURVE25519_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a public key from a slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; CURVE25519_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: CURVE25519_KEY_LENGTH, actual: bytes.len() }
        })?;
        Ok(Self(bytes))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; CURVE25519_KEY_LENGTH] {
        &self.0
    }

    /// Owned copy of the raw key bytes.
    pub fn to_bytes(self) -> [u8; CURVE25519_KEY_LENGTH] {
        self.0
    }
}

/// Output of an X25519 Diffie-Hellman exchange.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Raw shared secret bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Private half of a Curve25519 key pair.
#[derive(Clone)]
pub struct Curve25519SecretKey(StaticSecret);

impl Curve25519SecretKey {
    /// Build a secret key from 32 random bytes. Clamping happens inside the
    /// scalar multiplication, so any byte pattern is valid.
    pub fn from_bytes(bytes: [u8; CURVE25519_KEY_LENGTH]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Raw secret bytes, for pickling.
    pub fn to_bytes(&self) -> [u8; CURVE25519_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// Public key matching this secret.
    pub fn public_key(&self) -> Curve25519PublicKey {
        Curve25519PublicKey(PublicKey::from(&self.0).to_bytes())
    }

    /// X25519 key agreement with a peer's public key.
    pub fn diffie_hellman(&self, their_key: &Curve25519PublicKey) -> SharedSecret {
        let shared = self.0.diffie_hellman(&PublicKey::from(their_key.0));
        SharedSecret(shared.to_bytes())
    }
}

/// Curve25519 key pair with the public key cached.
#[derive(Clone)]
pub struct Curve25519KeyPair {
    secret: Curve25519SecretKey,
    public: Curve25519PublicKey,
}

impl Curve25519KeyPair {
    /// Derive a key pair from 32 bytes of secret material.
    pub fn from_secret_bytes(bytes: [u8; CURVE25519_KEY_LENGTH]) -> Self {
        let secret = Curve25519SecretKey::from_bytes(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Secret half.
    pub fn secret_key(&self) -> &Curve25519SecretKey {
        &self.secret
    }

    /// Public half.
    pub fn public_key(&self) -> Curve25519PublicKey {
        self.public
    }

    /// X25519 key agreement with a peer's public key.
    pub fn diffie_hellman(&self, their_key: &Curve25519PublicKey) -> SharedSecret {
        self.secret.diffie_hellman(their_key)
    }
}

/// Ed25519 public key used to verify signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey([u8; ED25519_PUBLIC_KEY_LENGTH]);

impl Ed25519PublicKey {
    /// Parse a public key, rejecting byte strings that are not curve points.
    pub fn from_bytes(bytes: [u8; ED25519_PUBLIC_KEY_LENGTH]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidSigningKey)?;
        Ok(Self(bytes))
    }

    /// Parse a public key from a slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; ED25519_PUBLIC_KEY_LENGTH] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: ED25519_PUBLIC_KEY_LENGTH,
                actual: bytes.len(),
            })?;
        Self::from_bytes(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; ED25519_PUBLIC_KEY_LENGTH] {
        &self.0
    }

    /// Verify `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidSigningKey)?;
        let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify(message, &signature).map_err(|_| CryptoError::BadSignature)
    }
}

/// Detached Ed25519 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature([u8; ED25519_SIGNATURE_LENGTH]);

impl Ed25519Signature {
    /// Wrap raw signature bytes.
    pub const fn from_bytes(bytes: [u8; ED25519_SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a signature from a slice of exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; ED25519_SIGNATURE_LENGTH] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: ED25519_SIGNATURE_LENGTH,
                actual: bytes.len(),
            })?;
        Ok(Self(bytes))
    }

    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; ED25519_SIGNATURE_LENGTH] {
        &self.0
    }

    /// Owned copy of the raw signature bytes.
    pub fn to_bytes(self) -> [u8; ED25519_SIGNATURE_LENGTH] {
        self.0
    }
}

/// Ed25519 signing key pair.
#[derive(Clone)]
pub struct Ed25519KeyPair {
    signing: SigningKey,
    public: Ed25519PublicKey,
}

impl Ed25519KeyPair {
    /// Derive a key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; ED25519_SEED_LENGTH]) -> Self {
        let signing = SigningKey::from_bytes(seed);
        let public = Ed25519PublicKey(signing.verifying_key().to_bytes());
        Self { signing, public }
    }

    /// The seed this key pair was derived from, for pickling.
    pub fn seed(&self) -> [u8; ED25519_SEED_LENGTH] {
        self.signing.to_bytes()
    }

    /// Public half.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.public
    }

    /// Sign `message`. EdDSA is deterministic for a given key and message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing.sign(message).to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diffie_hellman_agrees() {
        let alice = Curve25519KeyPair::from_secret_bytes([1u8; 32]);
        let bob = Curve25519KeyPair::from_secret_bytes([2u8; 32]);

        let ab = alice.diffie_hellman(&bob.public_key());
        let ba = bob.diffie_hellman(&alice.public_key());

        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn secret_key_roundtrips_through_bytes() {
        let pair = Curve25519KeyPair::from_secret_bytes([7u8; 32]);
        let restored = Curve25519KeyPair::from_secret_bytes(pair.secret_key().to_bytes());
        assert_eq!(pair.public_key(), restored.public_key());
    }

    #[test]
    fn public_key_from_short_slice_fails() {
        let result = Curve25519PublicKey::from_slice(&[0u8; 31]);
        assert_eq!(result, Err(CryptoError::InvalidKeyLength { expected: 32, actual: 31 }));
    }

    #[test]
    fn sign_verify_roundtrip() {
        let pair = Ed25519KeyPair::from_seed(&[3u8; 32]);
        let signature = pair.sign(b"message");
        assert!(pair.public_key().verify(b"message", &signature).is_ok());
    }

    #[test]
    fn signing_is_deterministic() {
        let pair = Ed25519KeyPair::from_seed(&[3u8; 32]);
        assert_eq!(pair.sign(b"message"), pair.sign(b"message"));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let pair = Ed25519KeyPair::from_seed(&[3u8; 32]);
        let signature = pair.sign(b"message");
        assert_eq!(
            pair.public_key().verify(b"massage", &signature),
            Err(CryptoError::BadSignature)
        );
    }

    #[test]
    fn seed_roundtrip_preserves_public_key() {
        let pair = Ed25519KeyPair::from_seed(&[9u8; 32]);
        let restored = Ed25519KeyPair::from_seed(&pair.seed());
        assert_eq!(pair.public_key(), restored.public_key());
    }
}
