//! AES-256-CBC with truncated HMAC-SHA256
//!
//! One input key is expanded with HKDF into an AES key, a MAC key and an IV.
//! Callers MAC whatever framing they need (the whole encoded message for
//! ratchet messages, just the ciphertext for PK messages and pickles), so
//! encryption and authentication are exposed separately.

use aes::{
    Aes256,
    cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7},
};
use hmac::Mac;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{
    error::CryptoError,
    kdf::{HmacSha256, hkdf_sha256},
};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Length of the truncated MAC appended to messages
pub const MAC_LENGTH: usize = 8;

/// AES block size, the granularity of CBC ciphertexts
pub const AES_BLOCK_SIZE: usize = 16;

/// Keys expanded from a single cipher input key.
///
/// Layout of the 80-byte HKDF output: AES key (32) | MAC key (32) | IV (16).
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherKeys {
    aes_key: [u8; 32],
    mac_key: [u8; 32],
    iv: [u8; 16],
}

impl CipherKeys {
    /// Expand `key` under the domain-separation label `info`.
    pub fn derive(key: &[u8], info: &[u8]) -> Self {
        let mut expanded: [u8; 80] = hkdf_sha256(None, key, info);

        let mut keys = Self { aes_key: [0u8; 32], mac_key: [0u8; 32], iv: [0u8; 16] };
        keys.aes_key.copy_from_slice(&expanded[0..32]);
        keys.mac_key.copy_from_slice(&expanded[32..64]);
        keys.iv.copy_from_slice(&expanded[64..80]);
        expanded.zeroize();

        keys
    }

    /// Encrypt with PKCS#7 padding.
    ///
    /// The ciphertext is always a non-empty multiple of the block size.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Aes256CbcEnc::new(&self.aes_key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// Decrypt and strip PKCS#7 padding.
    ///
    /// Callers MUST verify the MAC before calling this.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidPadding);
        }

        Aes256CbcDec::new(&self.aes_key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::InvalidPadding)
    }

    /// Truncated HMAC-SHA256 over `data`.
    pub fn mac(&self, data: &[u8]) -> [u8; MAC_LENGTH] {
        let mac = self.hmac(data).finalize().into_bytes();
        let mut truncated = [0u8; MAC_LENGTH];
        truncated.copy_from_slice(&mac[..MAC_LENGTH]);
        truncated
    }

    /// Verify a truncated MAC over `data` in constant time.
    pub fn verify_mac(&self, data: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
        if tag.len() != MAC_LENGTH {
            return Err(CryptoError::MacMismatch);
        }
        self.hmac(data).verify_truncated_left(tag).map_err(|_| CryptoError::MacMismatch)
    }

    fn hmac(&self, data: &[u8]) -> HmacSha256 {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.mac_key) else {
            unreachable!("HMAC-SHA256 accepts any key size");
        };
        mac.update(data);
        mac
    }
}

/// Ciphertext length for a plaintext of `plaintext_len` bytes.
pub fn ciphertext_len(plaintext_len: usize) -> usize {
    (plaintext_len / AES_BLOCK_SIZE + 1) * AES_BLOCK_SIZE
}
