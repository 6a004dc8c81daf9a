//! Megolm group sessions.
//!
//! One sender encrypts for many receivers without per-message key exchange.
//! The sender creates an [`OutboundGroupSession`] and shares its
//! [`OutboundGroupSession::session_key`] with each receiver over a pairwise
//! session; each receiver builds an [`InboundGroupSession`] from it.
//!
//! ```text
//! OutboundGroupSession ── session_key ──► InboundGroupSession (verified)
//!         │                                       │
//!         │ encrypt (index i, then advance)       │ decrypt (any index ≥ first known)
//!         ▼                                       ▼
//!   signed group message ───────────────────► plaintext, i
//!
//! InboundGroupSession ── export_at(j) ──► InboundGroupSession::import
//!                                          (unverified, first known = j)
//! ```
//!
//! # Security
//!
//! - The ratchet only moves forward: a session key or export at index `i`
//!   reveals nothing about messages before `i`
//! - Every message is signed by the sender's Ed25519 key, so receivers that
//!   share the decryption key still cannot forge messages for each other

mod inbound;
mod outbound;

pub use inbound::InboundGroupSession;
pub use outbound::{GROUP_SESSION_RANDOM_LENGTH, OutboundGroupSession};
use tether_crypto::{MEGOLM_RATCHET_LENGTH, Megolm};
use zeroize::Zeroize;

use crate::error::{OlmError, Result};

fn ratchet_from_pickle(bytes: &[u8], index: u32) -> Result<Megolm> {
    let mut ratchet: [u8; MEGOLM_RATCHET_LENGTH] =
        bytes.try_into().map_err(|_| OlmError::CorruptedPickle)?;
    let megolm = Megolm::new(&ratchet, index);
    ratchet.zeroize();
    Ok(megolm)
}
