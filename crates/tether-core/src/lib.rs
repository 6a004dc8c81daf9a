//! Tether Sessions
//!
//! End-to-end encryption state machines for one device: its long-lived
//! [`Account`], double ratchet [`Session`]s with peer devices, Megolm group
//! sessions, and anonymous public-key encryption.
//!
//! # Architecture
//!
//! Every entity is a plain synchronous state machine with no I/O and no
//! internal locking. Operations that need randomness come in two forms: a
//! `*_with_random` form taking caller-supplied bytes, and a convenience form
//! drawing them from an [`Environment`]. Tests drive the first form (or a
//! seeded environment) and replay conversations byte-for-byte.
//!
//! Every fallible operation returns [`Result`]. A call that fails leaves the
//! entity exactly as it was.
//!
//! # Components
//!
//! - [`Account`]: identity keys, one-time keys, signed prekey, fallback key
//! - [`Session`]: pairwise double ratchet
//! - [`OutboundGroupSession`] / [`InboundGroupSession`]: Megolm group sessions
//! - [`PkEncryption`] / [`PkDecryption`]: anonymous public-key encryption
//! - [`PickleKey`]: encrypted persistence for every entity above
//! - [`utility`]: hashing and signature checks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod config;
pub mod env;
pub mod error;
pub mod group;
pub mod pickle;
pub mod pk;
pub mod session;
pub mod session_id;
pub mod utility;

pub use account::{Account, IdentityKeys, MAX_ONE_TIME_KEYS, SignedPreKey};
pub use config::SessionConfig;
pub use env::{Environment, SystemEnv};
pub use error::{OlmError, Result};
pub use group::{InboundGroupSession, OutboundGroupSession};
pub use pickle::PickleKey;
pub use pk::{PkDecryption, PkEncryption, PkMessage};
pub use session::Session;
pub use session_id::SessionId;
pub use tether_crypto::{Curve25519PublicKey, Ed25519PublicKey, Ed25519Signature};
pub use tether_proto::MessageType;
