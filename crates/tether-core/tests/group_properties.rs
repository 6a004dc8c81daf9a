//! Property-based tests for Megolm group sessions
//!
//! 1. **Round-trip**: every receiver decrypts every message to its plaintext
//!    and index
//! 2. **Boundary**: a receiver starting at index `n` rejects everything
//!    below `n` and accepts everything from `n` on
//! 3. **Authenticity**: any flipped bit in a message is rejected
//! 4. **Export**: an export at index `i` decrypts exactly the messages from
//!    `i` on

use proptest::prelude::*;
use tether_core::{
    InboundGroupSession, OlmError, OutboundGroupSession, PickleKey,
    group::GROUP_SESSION_RANDOM_LENGTH,
};

fn outbound(seed: u8) -> OutboundGroupSession {
    let random: Vec<u8> = (0..GROUP_SESSION_RANDOM_LENGTH).map(|i| (i as u8) ^ seed).collect();
    OutboundGroupSession::new_with_random(&random).unwrap()
}

fn plaintext() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        Just(Vec::new()),
        prop::collection::vec(any::<u8>(), 0..64),
        prop::collection::vec(any::<u8>(), 1024..8192),
        "\\PC{0,256}".prop_map(String::into_bytes),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn prop_group_roundtrip(seed in any::<u8>(), text in plaintext(), skip in 0u32..50) {
        let mut outbound = outbound(seed);
        let mut inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();

        for _ in 0..skip {
            outbound.encrypt(b"not delivered");
        }
        let message = outbound.encrypt(&text);

        let (decrypted, index) = inbound.decrypt(&message).unwrap();
        prop_assert_eq!(decrypted, text);
        prop_assert_eq!(index, skip);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_import_boundary(start in 0u32..20, index in 0u32..30) {
        let mut outbound = outbound(1);
        let session_key = outbound.session_key();
        let messages: Vec<_> = (0..30u32).map(|i| outbound.encrypt(&i.to_be_bytes())).collect();

        let inbound = InboundGroupSession::new(&session_key).unwrap();
        let mut imported = InboundGroupSession::import(&inbound.export_at(start).unwrap()).unwrap();
        prop_assert_eq!(imported.first_known_index(), start);

        let result = imported.decrypt(&messages[index as usize]);
        if index < start {
            prop_assert_eq!(result, Err(OlmError::UnknownMessageIndex { index }));
        } else {
            prop_assert_eq!(result, Ok((index.to_be_bytes().to_vec(), index)));
        }
    }

    #[test]
    fn prop_flipped_bit_is_rejected(seed in any::<u8>(), bit in 0usize..1024) {
        let mut outbound = outbound(seed);
        let mut inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();
        let message = outbound.encrypt(b"authenticated group message");

        let mut tampered = message.clone();
        let bit = bit % (tampered.len() * 8);
        tampered[bit / 8] ^= 1 << (bit % 8);

        prop_assert!(inbound.decrypt(&tampered).is_err());
        prop_assert_eq!(inbound.decrypt(&message).unwrap().1, 0);
    }

    #[test]
    fn prop_pickled_receiver_keeps_decrypting(seed in any::<u8>(), delivered in 0u32..10) {
        let key = PickleKey::from_bytes([seed; 32]);
        let mut outbound = outbound(seed);
        let mut inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();

        for _ in 0..delivered {
            inbound.decrypt(&outbound.encrypt(b"before")).unwrap();
        }

        let mut outbound = OutboundGroupSession::from_pickle(&outbound.pickle(&key), &key).unwrap();
        let mut inbound = InboundGroupSession::from_pickle(&inbound.pickle(&key), &key).unwrap();
        prop_assert_eq!(
            inbound.decrypt(&outbound.encrypt(b"after")).unwrap(),
            (b"after".to_vec(), delivered)
        );
    }
}

#[test]
fn import_at_five_rejects_three() {
    let mut outbound = outbound(5);
    let session_key = outbound.session_key();
    let messages: Vec<_> = (0..8u8).map(|i| outbound.encrypt(&[i])).collect();

    let exported = InboundGroupSession::new(&session_key).unwrap().export_at(5).unwrap();
    let mut imported = InboundGroupSession::import(&exported).unwrap();

    assert_eq!(imported.decrypt(&messages[3]), Err(OlmError::UnknownMessageIndex { index: 3 }));
    for i in 5..8u8 {
        assert_eq!(imported.decrypt(&messages[i as usize]).unwrap(), (vec![i], u32::from(i)));
    }
}

#[test]
fn flipped_ciphertext_or_signature_bits_are_rejected() {
    let mut outbound = outbound(9);
    let mut inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();
    let message = outbound.encrypt(b"every bit counts");

    for bit in 0..message.len() * 8 {
        let mut tampered = message.clone();
        tampered[bit / 8] ^= 1 << (bit % 8);
        assert!(inbound.decrypt(&tampered).is_err(), "bit {bit} accepted");
    }
    assert_eq!(inbound.decrypt(&message).unwrap().0, b"every bit counts");
}

#[test]
fn receivers_cannot_forge_for_each_other() {
    let mut sender = outbound(3);
    let mut receiver = InboundGroupSession::new(&sender.session_key()).unwrap();
    receiver.decrypt(&sender.encrypt(b"genuine")).unwrap();

    // Anyone without the sender's signing key produces unverifiable messages.
    let mut forger = outbound(4);
    let forged = forger.encrypt(b"forged");
    assert_eq!(receiver.decrypt(&forged), Err(OlmError::BadSignature));
}
