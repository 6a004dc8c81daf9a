//! Group session messages
//!
//! ```text
//! 0x03 | 0x08 message_index | 0x12 len ciphertext | mac[8] | signature[64]
//! ```
//!
//! The MAC covers the body; the Ed25519 signature covers the body and the
//! MAC, so a receiver can reject forgeries before touching key material.

use crate::{
    MAC_LENGTH, PROTOCOL_VERSION, SIGNATURE_LENGTH,
    errors::{ProtocolError, Result},
    varint::{Reader, put_bytes_field, put_varint_field, varint_length},
};

const MESSAGE_INDEX_TAG: u8 = 0x08;
const CIPHERTEXT_TAG: u8 = 0x12;

/// A decoded group message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMessage {
    /// Ratchet index the message was encrypted at
    pub message_index: u32,
    /// AES-256-CBC ciphertext
    pub ciphertext: Vec<u8>,
}

/// A group message split into its parsed fields and authenticated regions.
#[derive(Debug)]
pub struct SignedGroupMessage<'a> {
    /// Parsed fields
    pub message: GroupMessage,
    /// Bytes covered by the MAC
    pub body: &'a [u8],
    /// Truncated MAC as received
    pub mac: &'a [u8],
    /// Bytes covered by the signature (body and MAC)
    pub signed: &'a [u8],
    /// Ed25519 signature as received
    pub signature: &'a [u8; SIGNATURE_LENGTH],
}

impl GroupMessage {
    /// Encoded length including MAC and signature.
    pub fn encoded_len(&self) -> usize {
        1 + 1
            + varint_length(u64::from(self.message_index))
            + 1
            + varint_length(self.ciphertext.len() as u64)
            + self.ciphertext.len()
            + MAC_LENGTH
            + SIGNATURE_LENGTH
    }

    /// Encode the body, append its MAC, then sign everything so far.
    pub fn encode(
        &self,
        mac_fn: impl FnOnce(&[u8]) -> [u8; MAC_LENGTH],
        sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LENGTH],
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(PROTOCOL_VERSION);
        put_varint_field(&mut out, MESSAGE_INDEX_TAG, u64::from(self.message_index));
        put_bytes_field(&mut out, CIPHERTEXT_TAG, &self.ciphertext);

        let mac = mac_fn(&out);
        out.extend_from_slice(&mac);
        let signature = sign_fn(&out);
        out.extend_from_slice(&signature);

        debug_assert_eq!(out.len(), self.encoded_len());
        out
    }

    /// Decode a group message, leaving signature and MAC checks to the caller.
    pub fn decode(bytes: &[u8]) -> Result<SignedGroupMessage<'_>> {
        let minimum = 1 + MAC_LENGTH + SIGNATURE_LENGTH;
        if bytes.len() < minimum {
            return Err(ProtocolError::Truncated { expected: minimum, actual: bytes.len() });
        }

        let (signed, signature) = bytes.split_at(bytes.len() - SIGNATURE_LENGTH);
        let (body, mac) = signed.split_at(signed.len() - MAC_LENGTH);
        let signature: &[u8; SIGNATURE_LENGTH] =
            signature.try_into().map_err(|_| ProtocolError::InvalidFieldLength {
                field: "signature",
                expected: SIGNATURE_LENGTH,
                actual: signature.len(),
            })?;

        let mut reader = Reader::new(body);
        let version = reader.read_u8()?;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let mut message_index = None;
        let mut ciphertext = None;

        while !reader.is_empty() {
            let tag = reader.read_u8()?;
            match tag {
                MESSAGE_INDEX_TAG => message_index = Some(reader.read_varint()?),
                CIPHERTEXT_TAG => ciphertext = Some(reader.read_length_delimited()?),
                _ => reader.skip_field(tag)?,
            }
        }

        let message = Self {
            message_index: message_index.ok_or(ProtocolError::MissingField("message_index"))?,
            ciphertext: ciphertext.ok_or(ProtocolError::MissingField("ciphertext"))?.to_vec(),
        };

        Ok(SignedGroupMessage { message, body, mac, signed, signature })
    }
}
