//! Pairwise session messages
//!
//! A normal message carries one ratchet step:
//!
//! ```text
//! 0x03 | 0x0A len ratchet_key | 0x10 counter | 0x22 len ciphertext | mac[8]
//! ```
//!
//! A prekey message wraps the first normal message together with the
//! handshake keys the recipient needs to derive the same root key:
//!
//! ```text
//! 0x03 | 0x0A len one_time_key? | 0x12 len base_key | 0x1A len identity_key
//!      | 0x22 len message | 0x2A len prekey
//! ```
//!
//! Fields may appear in any order on decode and unknown fields are skipped.
//! The MAC covers every byte before it and is checked by the session layer.

use crate::{
    KEY_LENGTH, MAC_LENGTH, PROTOCOL_VERSION,
    errors::{ProtocolError, Result},
    varint::{Reader, put_bytes_field, put_varint_field, varint_length},
};

const RATCHET_KEY_TAG: u8 = 0x0A;
const COUNTER_TAG: u8 = 0x10;
const CIPHERTEXT_TAG: u8 = 0x22;

const ONE_TIME_KEY_TAG: u8 = 0x0A;
const BASE_KEY_TAG: u8 = 0x12;
const IDENTITY_KEY_TAG: u8 = 0x1A;
const MESSAGE_TAG: u8 = 0x22;
const PREKEY_TAG: u8 = 0x2A;

/// Kind of pairwise message, transmitted out of band alongside the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// First message of an outbound session, carrying handshake keys
    PreKey = 0,
    /// Any later message
    Normal = 1,
}

impl MessageType {
    /// Parse the numeric message type. `None` if unrecognized.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::PreKey),
            1 => Some(Self::Normal),
            _ => None,
        }
    }

    /// Numeric message type.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// A decoded normal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sender's current ratchet public key
    pub ratchet_key: [u8; KEY_LENGTH],
    /// Index of the message key in the sender's chain
    pub counter: u32,
    /// AES-256-CBC ciphertext
    pub ciphertext: Vec<u8>,
}

/// A normal message split into its parsed fields and authenticated bytes.
#[derive(Debug)]
pub struct MacedMessage<'a> {
    /// Parsed fields
    pub message: Message,
    /// Bytes covered by the MAC
    pub body: &'a [u8],
    /// Truncated MAC as received
    pub mac: &'a [u8],
}

impl Message {
    /// Encoded length including the MAC.
    pub fn encoded_len(&self) -> usize {
        1 + 1
            + varint_length(KEY_LENGTH as u64)
            + KEY_LENGTH
            + 1
            + varint_length(u64::from(self.counter))
            + 1
            + varint_length(self.ciphertext.len() as u64)
            + self.ciphertext.len()
            + MAC_LENGTH
    }

    /// Encode the body and append the MAC `mac_fn` computes over it.
    pub fn encode(&self, mac_fn: impl FnOnce(&[u8]) -> [u8; MAC_LENGTH]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(PROTOCOL_VERSION);
        put_bytes_field(&mut out, RATCHET_KEY_TAG, &self.ratchet_key);
        put_varint_field(&mut out, COUNTER_TAG, u64::from(self.counter));
        put_bytes_field(&mut out, CIPHERTEXT_TAG, &self.ciphertext);

        let mac = mac_fn(&out);
        out.extend_from_slice(&mac);

        debug_assert_eq!(out.len(), self.encoded_len());
        out
    }

    /// Decode a message, leaving MAC verification to the caller.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Truncated` if there is no room for version and MAC
    /// - `ProtocolError::UnsupportedVersion` if the version byte is not 3
    /// - `ProtocolError::MissingField` if the ratchet key, counter or
    ///   ciphertext is absent
    pub fn decode(bytes: &[u8]) -> Result<MacedMessage<'_>> {
        if bytes.len() < 1 + MAC_LENGTH {
            return Err(ProtocolError::Truncated { expected: 1 + MAC_LENGTH, actual: bytes.len() });
        }
        let (body, mac) = bytes.split_at(bytes.len() - MAC_LENGTH);

        let mut reader = Reader::new(body);
        check_version(&mut reader)?;

        let mut ratchet_key = None;
        let mut counter = None;
        let mut ciphertext = None;

        while !reader.is_empty() {
            let tag = reader.read_u8()?;
            match tag {
                RATCHET_KEY_TAG => ratchet_key = Some(reader.read_fixed("ratchet_key")?),
                COUNTER_TAG => counter = Some(reader.read_varint()?),
                CIPHERTEXT_TAG => ciphertext = Some(reader.read_length_delimited()?),
                _ => reader.skip_field(tag)?,
            }
        }

        let message = Self {
            ratchet_key: ratchet_key.ok_or(ProtocolError::MissingField("ratchet_key"))?,
            counter: counter.ok_or(ProtocolError::MissingField("counter"))?,
            ciphertext: ciphertext.ok_or(ProtocolError::MissingField("ciphertext"))?.to_vec(),
        };

        Ok(MacedMessage { message, body, mac })
    }
}

/// A decoded prekey message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreKeyMessage {
    /// Recipient's one-time or fallback key the sender claimed, if any
    pub one_time_key: Option<[u8; KEY_LENGTH]>,
    /// Sender's ephemeral handshake key
    pub base_key: [u8; KEY_LENGTH],
    /// Sender's Curve25519 identity key
    pub identity_key: [u8; KEY_LENGTH],
    /// Recipient's signed prekey the sender used
    pub prekey: [u8; KEY_LENGTH],
    /// Encoded inner normal message, MAC included
    pub message: Vec<u8>,
}

impl PreKeyMessage {
    /// Encode the prekey message.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 * (KEY_LENGTH + 2) + self.message.len() + 4);
        out.push(PROTOCOL_VERSION);
        if let Some(one_time_key) = &self.one_time_key {
            put_bytes_field(&mut out, ONE_TIME_KEY_TAG, one_time_key);
        }
        put_bytes_field(&mut out, BASE_KEY_TAG, &self.base_key);
        put_bytes_field(&mut out, IDENTITY_KEY_TAG, &self.identity_key);
        put_bytes_field(&mut out, MESSAGE_TAG, &self.message);
        put_bytes_field(&mut out, PREKEY_TAG, &self.prekey);
        out
    }

    /// Decode a prekey message. The inner message is left encoded.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnsupportedVersion` if the version byte is not 3
    /// - `ProtocolError::MissingField` if any key other than the one-time key,
    ///   or the inner message, is absent
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        check_version(&mut reader)?;

        let mut one_time_key = None;
        let mut base_key = None;
        let mut identity_key = None;
        let mut message = None;
        let mut prekey = None;

        while !reader.is_empty() {
            let tag = reader.read_u8()?;
            match tag {
                ONE_TIME_KEY_TAG => one_time_key = Some(reader.read_fixed("one_time_key")?),
                BASE_KEY_TAG => base_key = Some(reader.read_fixed("base_key")?),
                IDENTITY_KEY_TAG => identity_key = Some(reader.read_fixed("identity_key")?),
                MESSAGE_TAG => message = Some(reader.read_length_delimited()?),
                PREKEY_TAG => prekey = Some(reader.read_fixed("prekey")?),
                _ => reader.skip_field(tag)?,
            }
        }

        Ok(Self {
            one_time_key,
            base_key: base_key.ok_or(ProtocolError::MissingField("base_key"))?,
            identity_key: identity_key.ok_or(ProtocolError::MissingField("identity_key"))?,
            prekey: prekey.ok_or(ProtocolError::MissingField("prekey"))?,
            message: message.ok_or(ProtocolError::MissingField("message"))?.to_vec(),
        })
    }
}

fn check_version(reader: &mut Reader<'_>) -> Result<()> {
    let version = reader.read_u8()?;
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }
    Ok(())
}
