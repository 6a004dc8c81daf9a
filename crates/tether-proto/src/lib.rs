//! Tether Wire Protocol
//!
//! Byte layouts for everything the session layer puts on the wire: pairwise
//! messages, prekey messages, group messages and group session keys.
//!
//! This crate only frames bytes. It never touches key material beyond
//! copying it, and it never verifies a MAC or signature: encoders take
//! closures that compute them over the exact bytes that will be sent, and
//! decoders return the authenticated regions alongside the parsed fields so
//! the caller can check them before trusting anything.
//!
//! # Invariants
//!
//! - Decoding never panics on arbitrary input
//! - `decode(encode(m)) == m` for every message
//! - The bytes handed to a MAC or signature closure are exactly the bytes the
//!   decoder later returns as the authenticated region

#![warn(missing_docs)]

pub mod errors;
pub mod group;
pub mod message;
pub mod session_key;
pub mod varint;

pub use errors::{ProtocolError, Result};
pub use group::{GroupMessage, SignedGroupMessage};
pub use message::{MacedMessage, Message, MessageType, PreKeyMessage};
pub use session_key::{ExportedSessionKey, RATCHET_LENGTH, SessionKey};

/// Version byte leading every pairwise and group message
pub const PROTOCOL_VERSION: u8 = 0x03;

/// Length of the truncated MAC trailing every message
pub const MAC_LENGTH: usize = 8;

/// Length of a Curve25519 or Ed25519 public key
pub const KEY_LENGTH: usize = 32;

/// Length of an Ed25519 signature
pub const SIGNATURE_LENGTH: usize = 64;
