//! End-to-end pairwise session tests.
//!
//! Each test drives two accounts through a real handshake and checks one
//! observable property of the conversation:
//! - Handshake and one-time key consumption
//! - Reordering inside the skip window, and the window's limit
//! - Sequential decryption and its interaction with tolerant decryption
//! - Tamper detection on every ciphertext and MAC bit
//! - Fallback keys standing in for exhausted one-time keys
//! - Forward secrecy of consumed message keys

use std::sync::{Arc, Mutex};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tether_core::{
    Account, Environment, MessageType, OlmError, PickleKey, Session, SignedPreKey,
    config::DEFAULT_MAX_MESSAGE_GAP,
};

#[derive(Clone)]
struct TestEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl TestEnv {
    fn seeded(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))) }
    }
}

impl Environment for TestEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap().fill_bytes(buffer);
    }

    fn wall_clock_secs(&self) -> u64 {
        1_700_000_000
    }
}

struct Peers {
    env: TestEnv,
    alice_account: Account,
    bob_account: Account,
    alice: Session,
    bob: Session,
}

/// Bob publishes a prekey and one one-time key; Alice claims them and sends
/// `first`; Bob accepts and decrypts it.
fn establish(seed: u64, first: &[u8]) -> Peers {
    let env = TestEnv::seeded(seed);
    let alice_account = Account::new(&env);
    let mut bob_account = Account::new(&env);

    let bob_prekey = bob_account.generate_prekey(&env);
    bob_account.generate_one_time_keys(&env, 1);
    let (_, bob_one_time_key) = bob_account.one_time_keys().pop_first().unwrap();
    bob_account.mark_keys_as_published();
    bob_account.mark_prekey_as_published(&env);

    let bob_keys = bob_account.identity_keys();
    let mut alice = Session::create_outbound(
        &env,
        &alice_account,
        bob_keys.curve25519,
        &bob_keys.ed25519,
        &bob_prekey,
        Some(bob_one_time_key),
    )
    .unwrap();

    let (message_type, message) = alice.encrypt(&env, first).unwrap();
    assert_eq!(message_type, MessageType::PreKey);

    let mut bob = Session::create_inbound(&bob_account, &message).unwrap();
    assert_eq!(bob.decrypt(message_type, &message).unwrap(), first);

    Peers { env, alice_account, bob_account, alice, bob }
}

#[test]
fn hello_world_conversation() {
    let Peers { env, alice_account, mut bob_account, mut alice, mut bob } = establish(1, b"hello");

    assert_eq!(alice.session_id(), bob.session_id());
    assert!(bob_account.remove_one_time_keys(&bob).is_ok());
    assert!(bob_account.one_time_keys().is_empty());
    assert_eq!(bob_account.remove_one_time_keys(&bob), Err(OlmError::UnknownKey));

    let (message_type, message) = alice.encrypt(&env, b"world").unwrap();
    assert_eq!(message_type, MessageType::Normal);
    assert_eq!(bob.decrypt(message_type, &message).unwrap(), b"world");

    let (reply_type, reply) = bob.encrypt(&env, b"hello back").unwrap();
    assert_eq!(reply_type, MessageType::Normal);
    assert_eq!(alice.decrypt(reply_type, &reply).unwrap(), b"hello back");
    assert!(alice.has_received_message());

    // Outbound sessions never consumed one of Alice's keys.
    let mut alice_account = alice_account;
    assert_eq!(alice_account.remove_one_time_keys(&alice), Err(OlmError::UnknownKey));
}

#[test]
fn long_ping_pong_conversation() {
    let Peers { env, mut alice, mut bob, .. } = establish(2, b"start");

    for round in 0..50u32 {
        let text = format!("alice {round}");
        let (message_type, message) = alice.encrypt(&env, text.as_bytes()).unwrap();
        assert_eq!(bob.decrypt(message_type, &message).unwrap(), text.as_bytes());

        let text = format!("bob {round}");
        let (message_type, message) = bob.encrypt(&env, text.as_bytes()).unwrap();
        assert_eq!(alice.decrypt(message_type, &message).unwrap(), text.as_bytes());
    }
}

#[test]
fn messages_one_three_two_all_decrypt() {
    let Peers { env, mut alice, mut bob, .. } = establish(3, b"zero");

    let one = alice.encrypt(&env, b"one").unwrap();
    let two = alice.encrypt(&env, b"two").unwrap();
    let three = alice.encrypt(&env, b"three").unwrap();

    assert_eq!(bob.decrypt(one.0, &one.1).unwrap(), b"one");
    assert_eq!(bob.decrypt(three.0, &three.1).unwrap(), b"three");
    assert_eq!(bob.decrypt(two.0, &two.1).unwrap(), b"two");
}

#[test]
fn reordering_across_ratchet_steps() {
    let Peers { env, mut alice, mut bob, .. } = establish(4, b"zero");

    let early = alice.encrypt(&env, b"early").unwrap();
    let (reply_type, reply) = bob.encrypt(&env, b"reply").unwrap();
    alice.decrypt(reply_type, &reply).unwrap();
    let late = alice.encrypt(&env, b"late").unwrap();

    assert_eq!(bob.decrypt(late.0, &late.1).unwrap(), b"late");
    assert_eq!(bob.decrypt(early.0, &early.1).unwrap(), b"early");
}

#[test]
fn gap_beyond_window_is_rejected() {
    let Peers { env, mut alice, mut bob, .. } = establish(5, b"zero");

    let mut last = None;
    for _ in 0..=DEFAULT_MAX_MESSAGE_GAP + 1 {
        last = Some(alice.encrypt(&env, b"skipped").unwrap());
    }
    let (message_type, message) = last.unwrap();

    let before = bob.describe();
    assert_eq!(
        bob.decrypt(message_type, &message),
        Err(OlmError::MessageGapTooLarge {
            gap: DEFAULT_MAX_MESSAGE_GAP + 1,
            limit: DEFAULT_MAX_MESSAGE_GAP
        })
    );
    assert_eq!(bob.describe(), before);
}

#[test]
fn gap_at_window_limit_is_accepted() {
    let Peers { env, mut alice, mut bob, .. } = establish(6, b"zero");

    let mut last = None;
    for _ in 0..=DEFAULT_MAX_MESSAGE_GAP {
        last = Some(alice.encrypt(&env, b"skipped").unwrap());
    }
    let (message_type, message) = last.unwrap();

    assert_eq!(bob.decrypt(message_type, &message).unwrap(), b"skipped");
}

#[test]
fn sequential_rejects_skip_that_tolerant_accepts() {
    let Peers { env, mut alice, mut bob, .. } = establish(7, b"zero");

    let one = alice.encrypt(&env, b"one").unwrap();
    let _two = alice.encrypt(&env, b"two").unwrap();
    let three = alice.encrypt(&env, b"three").unwrap();

    assert_eq!(bob.decrypt_sequential(one.0, &one.1).unwrap(), b"one");
    assert_eq!(
        bob.decrypt_sequential(three.0, &three.1),
        Err(OlmError::OutOfOrderMessage { expected: 2, received: 3 })
    );
    assert_eq!(bob.decrypt(three.0, &three.1).unwrap(), b"three");
}

#[test]
fn sequential_and_tolerant_share_one_ratchet() {
    let Peers { env, mut alice, mut bob, .. } = establish(8, b"zero");

    let messages: Vec<_> = (1..=4u8).map(|i| alice.encrypt(&env, &[i]).unwrap()).collect();

    // Tolerant decryption of 3 moves the chain past 1 and 2.
    assert_eq!(bob.decrypt(messages[2].0, &messages[2].1).unwrap(), vec![3]);

    // Sequential decryption now expects 4 and refuses the skipped ones.
    assert_eq!(
        bob.decrypt_sequential(messages[0].0, &messages[0].1),
        Err(OlmError::OutOfOrderMessage { expected: 4, received: 1 })
    );
    assert_eq!(bob.decrypt_sequential(messages[3].0, &messages[3].1).unwrap(), vec![4]);

    // The skipped keys remain available to tolerant decryption.
    assert_eq!(bob.decrypt(messages[0].0, &messages[0].1).unwrap(), vec![1]);
    assert_eq!(bob.decrypt(messages[1].0, &messages[1].1).unwrap(), vec![2]);
}

#[test]
fn every_ciphertext_and_mac_bit_is_authenticated() {
    let Peers { env, mut alice, mut bob, .. } = establish(9, b"zero");

    let plaintext = b"tamper with me";
    let (message_type, message) = alice.encrypt(&env, plaintext).unwrap();
    assert_eq!(message_type, MessageType::Normal);

    let ciphertext_len = tether_crypto::ciphertext_len(plaintext.len());
    let start = message.len() - tether_crypto::MAC_LENGTH - ciphertext_len;

    for byte in start..message.len() {
        for bit in 0..8 {
            let mut tampered = message.clone();
            tampered[byte] ^= 1 << bit;
            assert_eq!(
                bob.decrypt(message_type, &tampered),
                Err(OlmError::BadMessageMac),
                "bit {bit} of byte {byte}"
            );
        }
    }

    assert_eq!(bob.decrypt(message_type, &message).unwrap(), plaintext);
}

#[test]
fn wrong_version_is_reported() {
    let Peers { env, mut alice, mut bob, .. } = establish(10, b"zero");

    let (message_type, mut message) = alice.encrypt(&env, b"versioned").unwrap();
    message[0] = 0x02;
    assert_eq!(bob.decrypt(message_type, &message), Err(OlmError::BadMessageVersion(2)));
    assert!(matches!(bob.decrypt(message_type, &[0x03, 0x0A]), Err(OlmError::BadMessageFormat(_))));
}

#[test]
fn consumed_message_keys_are_gone() {
    let Peers { env, mut alice, mut bob, .. } = establish(11, b"zero");

    let messages: Vec<_> = (0..5u8).map(|i| alice.encrypt(&env, &[i]).unwrap()).collect();
    for (message_type, message) in &messages {
        bob.decrypt(*message_type, message).unwrap();
    }

    // Neither the live session nor a copy restored from its persisted state
    // can decrypt a message it already consumed.
    let key = PickleKey::from_bytes([7u8; 32]);
    let mut restored = Session::from_pickle(&bob.pickle(&key), &key).unwrap();
    for (index, (message_type, message)) in messages.iter().enumerate() {
        let index = index as u32 + 1;
        let consumed: Result<Vec<u8>, _> = Err(OlmError::UnknownMessageIndex { index });
        assert_eq!(bob.decrypt(*message_type, message), consumed);
        assert_eq!(restored.decrypt(*message_type, message), consumed);
    }
}

#[test]
fn fallback_key_replaces_exhausted_one_time_keys() {
    let env = TestEnv::seeded(12);
    let mut bob_account = Account::new(&env);
    let bob_prekey = bob_account.generate_prekey(&env);
    let fallback = bob_account.generate_fallback_key(&env);
    assert!(fallback.verify(&bob_account.identity_keys().ed25519).is_ok());
    bob_account.mark_keys_as_published();
    assert!(bob_account.unpublished_fallback_key().is_none());

    let bob_keys = bob_account.identity_keys();
    for sender in 0..2 {
        let alice_account = Account::new(&env);
        let mut alice = Session::create_outbound(
            &env,
            &alice_account,
            bob_keys.curve25519,
            &bob_keys.ed25519,
            &bob_prekey,
            Some(fallback.public_key),
        )
        .unwrap();
        let text = format!("from sender {sender}");
        let (message_type, message) = alice.encrypt(&env, text.as_bytes()).unwrap();

        let mut bob = Session::create_inbound(&bob_account, &message).unwrap();
        assert_eq!(bob.decrypt(message_type, &message).unwrap(), text.as_bytes());

        // Fallback keys stay usable after the session consumed them.
        assert!(bob_account.remove_one_time_keys(&bob).is_ok());
    }
}

#[test]
fn rotated_prekey_still_accepts_in_flight_handshake() {
    let env = TestEnv::seeded(13);
    let alice_account = Account::new(&env);
    let mut bob_account = Account::new(&env);
    let old_prekey = bob_account.generate_prekey(&env);

    let bob_keys = bob_account.identity_keys();
    let mut alice = Session::create_outbound(
        &env,
        &alice_account,
        bob_keys.curve25519,
        &bob_keys.ed25519,
        &old_prekey,
        None,
    )
    .unwrap();
    let (message_type, message) = alice.encrypt(&env, b"in flight").unwrap();

    let new_prekey: SignedPreKey = bob_account.generate_prekey(&env);
    assert_ne!(new_prekey.public_key, old_prekey.public_key);

    let mut bob = Session::create_inbound(&bob_account, &message).unwrap();
    assert_eq!(bob.decrypt(message_type, &message).unwrap(), b"in flight");
    assert_eq!(bob.one_time_key_used(), None);

    bob_account.forget_old_prekey();
    assert!(matches!(
        Session::create_inbound(&bob_account, &message),
        Err(OlmError::BadMessageKeyId)
    ));
}

#[test]
fn retried_prekey_message_matches_existing_session() {
    let Peers { alice_account, bob, .. } = establish(14, b"zero");
    let env = TestEnv::seeded(15);

    // A message from a different handshake does not match.
    let mut bob_account = Account::new(&env);
    let prekey = bob_account.generate_prekey(&env);
    let bob_keys = bob_account.identity_keys();
    let mut other = Session::create_outbound(
        &env,
        &alice_account,
        bob_keys.curve25519,
        &bob_keys.ed25519,
        &prekey,
        None,
    )
    .unwrap();
    let (_, other_message) = other.encrypt(&env, b"other").unwrap();

    assert!(!bob.matches_inbound(&other_message).unwrap());
    let alice_identity = alice_account.identity_keys().curve25519;
    assert!(!bob.matches_inbound_from(&alice_identity, &other_message).unwrap());
}

#[test]
fn identical_seeds_replay_identical_bytes() {
    let run = |seed| {
        let Peers { env, mut alice, .. } = establish(seed, b"zero");
        alice.encrypt(&env, b"replay").unwrap().1
    };
    assert_eq!(run(16), run(16));
    assert_ne!(run(16), run(17));
}

#[test]
fn huge_one_time_key_count_is_an_error() {
    let env = TestEnv::seeded(18);
    let mut account = Account::new(&env);
    account.generate_one_time_keys(&env, 3);
    let before = account.one_time_keys();

    let result = account.generate_one_time_keys_with_random(usize::MAX / 16, &[0u8; 32]);
    assert!(matches!(result, Err(OlmError::InsufficientRandomness { got: 32, .. })));
    assert_eq!(account.one_time_keys(), before);
}

#[test]
fn one_time_key_generation_is_capped() {
    let env = TestEnv::seeded(19);
    let mut account = Account::new(&env);
    account.generate_one_time_keys(&env, 1_000_000);
    assert_eq!(account.one_time_keys().len(), account.max_number_of_one_time_keys());
}
