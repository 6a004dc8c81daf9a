//! Olm and Megolm key schedules
//!
//! Curve25519 and Ed25519 keys, the HKDF/HMAC chains of the double ratchet,
//! the four-part Megolm hash ratchet and the AES-CBC + truncated HMAC
//! message cipher. Nothing here draws randomness: secret keys are built from
//! bytes handed in by the session layer.
//!
//! # Key Lifecycle
//!
//! Pairwise sessions and group sessions share the same symmetric cipher but
//! derive message keys differently:
//!
//! ```text
//! Pairwise (double ratchet)              Group (Megolm)
//!
//! handshake secret                       128 random bytes
//!        │                                      │
//!        ▼                                      ▼
//! HKDF → root key ◄── DH ratchet         R0 R1 R2 R3 hash ratchet
//!        │                                      │
//!        ▼                                      ▼
//! chain key → message key                full ratchet state
//!        │                                      │
//!        ▼                                      ▼
//! HKDF(OLM_KEYS) → AES-256-CBC + HMAC    HKDF(MEGOLM_KEYS) → AES-256-CBC + HMAC
//! ```
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain keys are overwritten on every advance
//! - Megolm parts can only be hashed forward
//! - Message and cipher keys zeroize on drop
//!
//! Authenticity:
//! - Every ciphertext carries a truncated HMAC-SHA256 checked in constant time
//! - Group messages are additionally signed with Ed25519
//! - MAC failure rejects the message before any decryption happens

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod megolm;
pub mod ratchet;

pub use cipher::{AES_BLOCK_SIZE, CipherKeys, MAC_LENGTH, ciphertext_len};
pub use error::CryptoError;
pub use kdf::{SHA256_LENGTH, hkdf_sha256, hmac_sha256, sha256};
pub use keys::{
    CURVE25519_KEY_LENGTH, Curve25519KeyPair, Curve25519PublicKey, Curve25519SecretKey,
    ED25519_PUBLIC_KEY_LENGTH, ED25519_SEED_LENGTH, ED25519_SIGNATURE_LENGTH, Ed25519KeyPair,
    Ed25519PublicKey, Ed25519Signature, SharedSecret,
};
pub use megolm::{MEGOLM_RATCHET_LENGTH, Megolm};
pub use ratchet::{ChainKey, MessageKey, RootKey, derive_initial_keys};
