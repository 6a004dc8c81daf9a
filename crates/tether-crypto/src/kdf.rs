//! Hash, HMAC and HKDF helpers over SHA-256

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// SHA-256 output length
pub const SHA256_LENGTH: usize = 32;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// SHA-256 digest of `input`.
pub fn sha256(input: &[u8]) -> [u8; SHA256_LENGTH] {
    let digest = Sha256::digest(input);
    let mut output = [0u8; SHA256_LENGTH];
    output.copy_from_slice(&digest);
    output
}

/// HMAC-SHA256 of `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; SHA256_LENGTH] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(data);
    let result = mac.finalize().into_bytes();

    let mut output = [0u8; SHA256_LENGTH];
    output.copy_from_slice(&result);
    output
}

/// HKDF-SHA256 extract-and-expand into an `N`-byte array.
///
/// `N` is a compile-time constant far below the 8160-byte HKDF-SHA256 limit
/// at every call site.
pub fn hkdf_sha256<const N: usize>(salt: Option<&[u8]>, ikm: &[u8], info: &[u8]) -> [u8; N] {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);

    let mut okm = [0u8; N];
    let Ok(()) = hkdf.expand(info, &mut okm) else {
        unreachable!("output length is within the HKDF-SHA256 limit");
    };

    okm
}
