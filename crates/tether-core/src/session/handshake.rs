//! Session establishment key agreement.
//!
//! The initiator (Alice) combines its identity key and a fresh base key with
//! the responder's (Bob's) identity key, signed prekey and optional one-time
//! key. Both sides concatenate the Diffie-Hellman outputs in the same order:
//!
//! ```text
//! DH(A_identity, B_prekey) || DH(A_base, B_identity)
//!     || DH(A_base, B_prekey) || DH(A_base, B_one_time)?
//! ```
//!
//! and feed the result to `derive_initial_keys`. Changing the order produces
//! sessions that work against each other but not against any other peer.

use tether_crypto::{Curve25519PublicKey, Curve25519SecretKey, sha256};
use zeroize::Zeroizing;

use crate::session_id::SessionId;

/// Public keys that identify a session's handshake, from Alice's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionKeys {
    /// Alice's identity key
    pub identity_key: Curve25519PublicKey,
    /// Alice's ephemeral base key
    pub base_key: Curve25519PublicKey,
    /// Bob's one-time or fallback key, if one was claimed
    pub one_time_key: Option<Curve25519PublicKey>,
    /// Bob's signed prekey
    pub prekey: Curve25519PublicKey,
}

impl SessionKeys {
    /// `SHA-256(identity || base || prekey || one_time?)`
    pub fn session_id(&self) -> SessionId {
        let mut input = Vec::with_capacity(4 * 32);
        input.extend_from_slice(self.identity_key.as_bytes());
        input.extend_from_slice(self.base_key.as_bytes());
        input.extend_from_slice(self.prekey.as_bytes());
        if let Some(one_time_key) = &self.one_time_key {
            input.extend_from_slice(one_time_key.as_bytes());
        }
        SessionId::from_bytes(sha256(&input))
    }
}

/// Alice's side of the key agreement.
pub(crate) fn outbound_secret(
    identity_key: &Curve25519SecretKey,
    base_key: &Curve25519SecretKey,
    their_identity_key: &Curve25519PublicKey,
    their_prekey: &Curve25519PublicKey,
    their_one_time_key: Option<&Curve25519PublicKey>,
) -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(Vec::with_capacity(4 * 32));
    secret.extend_from_slice(identity_key.diffie_hellman(their_prekey).as_bytes());
    secret.extend_from_slice(base_key.diffie_hellman(their_identity_key).as_bytes());
    secret.extend_from_slice(base_key.diffie_hellman(their_prekey).as_bytes());
    if let Some(one_time_key) = their_one_time_key {
        secret.extend_from_slice(base_key.diffie_hellman(one_time_key).as_bytes());
    }
    secret
}

/// Bob's side of the key agreement. Produces the same bytes as
/// [`outbound_secret`] for matching key pairs.
pub(crate) fn inbound_secret(
    identity_key: &Curve25519SecretKey,
    prekey: &Curve25519SecretKey,
    one_time_key: Option<&Curve25519SecretKey>,
    their_identity_key: &Curve25519PublicKey,
    their_base_key: &Curve25519PublicKey,
) -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(Vec::with_capacity(4 * 32));
    secret.extend_from_slice(prekey.diffie_hellman(their_identity_key).as_bytes());
    secret.extend_from_slice(identity_key.diffie_hellman(their_base_key).as_bytes());
    secret.extend_from_slice(prekey.diffie_hellman(their_base_key).as_bytes());
    if let Some(one_time_key) = one_time_key {
        secret.extend_from_slice(one_time_key.diffie_hellman(their_base_key).as_bytes());
    }
    secret
}
