//! Property-based tests for message encoding/decoding
//!
//! These tests verify that every wire format decodes to what was encoded and
//! that the authenticated regions handed back by the decoder are exactly the
//! bytes the encoder authenticated.

use proptest::prelude::*;
use tether_proto::{
    ExportedSessionKey, GroupMessage, KEY_LENGTH, MAC_LENGTH, Message, PreKeyMessage,
    ProtocolError, SIGNATURE_LENGTH, SessionKey,
};

/// Strategy for generating arbitrary normal messages
fn arbitrary_message() -> impl Strategy<Value = Message> {
    (any::<[u8; KEY_LENGTH]>(), any::<u32>(), prop::collection::vec(any::<u8>(), 0..512)).prop_map(
        |(ratchet_key, counter, ciphertext)| Message { ratchet_key, counter, ciphertext },
    )
}

/// Strategy for generating arbitrary prekey messages
fn arbitrary_prekey_message() -> impl Strategy<Value = PreKeyMessage> {
    (
        prop::option::of(any::<[u8; KEY_LENGTH]>()),
        any::<[u8; KEY_LENGTH]>(),
        any::<[u8; KEY_LENGTH]>(),
        any::<[u8; KEY_LENGTH]>(),
        prop::collection::vec(any::<u8>(), 0..512),
    )
        .prop_map(|(one_time_key, base_key, identity_key, prekey, message)| PreKeyMessage {
            one_time_key,
            base_key,
            identity_key,
            prekey,
            message,
        })
}

/// Strategy for generating arbitrary group messages
fn arbitrary_group_message() -> impl Strategy<Value = GroupMessage> {
    (any::<u32>(), prop::collection::vec(any::<u8>(), 0..512))
        .prop_map(|(message_index, ciphertext)| GroupMessage { message_index, ciphertext })
}

#[test]
fn prop_message_roundtrip() {
    proptest!(|(message in arbitrary_message(), mac in any::<[u8; MAC_LENGTH]>())| {
        let encoded = message.encode(|_| mac);
        let decoded = Message::decode(&encoded).expect("decode should succeed");

        // PROPERTY: Round-trip must be identity
        prop_assert_eq!(&decoded.message, &message);
        prop_assert_eq!(decoded.mac, &mac[..]);
        prop_assert_eq!(decoded.body.len() + MAC_LENGTH, encoded.len());
        prop_assert_eq!(encoded.len(), message.encoded_len());
    });
}

#[test]
fn prop_message_mac_region_is_stable() {
    proptest!(|(message in arbitrary_message())| {
        let mut authenticated = Vec::new();
        let encoded = message.encode(|body| {
            authenticated = body.to_vec();
            [0u8; MAC_LENGTH]
        });
        let decoded = Message::decode(&encoded).expect("decode should succeed");

        // PROPERTY: Decoder returns the exact bytes the encoder authenticated
        prop_assert_eq!(decoded.body, authenticated.as_slice());
    });
}

#[test]
fn prop_prekey_message_roundtrip() {
    proptest!(|(prekey_message in arbitrary_prekey_message())| {
        let encoded = prekey_message.encode();
        let decoded = PreKeyMessage::decode(&encoded).expect("decode should succeed");

        prop_assert_eq!(decoded, prekey_message);
    });
}

#[test]
fn prop_group_message_roundtrip() {
    proptest!(|(
        message in arbitrary_group_message(),
        mac in any::<[u8; MAC_LENGTH]>(),
        signature in prop::collection::vec(any::<u8>(), SIGNATURE_LENGTH),
    )| {
        let mut sig = [0u8; SIGNATURE_LENGTH];
        sig.copy_from_slice(&signature);

        let encoded = message.encode(|_| mac, |_| sig);
        let decoded = GroupMessage::decode(&encoded).expect("decode should succeed");

        prop_assert_eq!(&decoded.message, &message);
        prop_assert_eq!(decoded.mac, &mac[..]);
        prop_assert_eq!(&decoded.signature[..], &sig[..]);
        prop_assert_eq!(decoded.signed.len() + SIGNATURE_LENGTH, encoded.len());
    });
}

#[test]
fn prop_session_key_roundtrip() {
    proptest!(|(
        index in any::<u32>(),
        ratchet in prop::collection::vec(any::<u8>(), 128),
        signing_key in any::<[u8; KEY_LENGTH]>(),
    )| {
        let mut ratchet_bytes = [0u8; 128];
        ratchet_bytes.copy_from_slice(&ratchet);

        let key = SessionKey::new(index, &ratchet_bytes, &signing_key, |_| [9u8; SIGNATURE_LENGTH]);
        let parsed = SessionKey::from_bytes(&key.to_bytes()).expect("parse should succeed");
        prop_assert_eq!(parsed.message_index(), index);
        prop_assert_eq!(parsed.ratchet(), &ratchet_bytes);

        let export = ExportedSessionKey::new(index, &ratchet_bytes, &signing_key);
        let parsed =
            ExportedSessionKey::from_bytes(&export.to_bytes()).expect("parse should succeed");
        prop_assert_eq!(parsed.message_index(), index);
        prop_assert_eq!(parsed.signing_key(), &signing_key);
    });
}

#[test]
fn prop_decoders_never_panic() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..300))| {
        // PROPERTY: Arbitrary input yields Ok or Err, never a panic
        let _ = Message::decode(&bytes);
        let _ = PreKeyMessage::decode(&bytes);
        let _ = GroupMessage::decode(&bytes);
        let _ = SessionKey::from_bytes(&bytes);
        let _ = ExportedSessionKey::from_bytes(&bytes);
    });
}

#[test]
fn prop_truncated_message_never_decodes_to_original() {
    proptest!(|(message in arbitrary_message(), cut in 1usize..40)| {
        let encoded = message.encode(|_| [0u8; MAC_LENGTH]);
        let cut = cut.min(encoded.len());
        let truncated = &encoded[..encoded.len() - cut];

        // PROPERTY: Dropping trailing bytes never yields the same message
        // with the same MAC
        if let Ok(decoded) = Message::decode(truncated) {
            prop_assert!(decoded.message != message || decoded.mac != [0u8; MAC_LENGTH]);
        }
    });
}

#[test]
fn wrong_version_is_reported() {
    let message = Message { ratchet_key: [0; KEY_LENGTH], counter: 0, ciphertext: vec![0; 16] };
    let mut encoded = message.encode(|_| [0; MAC_LENGTH]);
    encoded[0] = 0x04;

    let err = Message::decode(&encoded).unwrap_err();
    assert_eq!(err, ProtocolError::UnsupportedVersion(4));
}
