//! Fuzz target for pickle restoration
//!
//! Starts from valid pickles of every entity and corrupts them with
//! fuzzer-chosen byte edits, truncation and extension.
//!
//! # Invariants
//!
//! - Restoring never panics
//! - An unmodified pickle always restores
//! - A modified pickle never restores under the same key

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tether_core::{
    Account, InboundGroupSession, OutboundGroupSession, PickleKey, PkDecryption, Session,
};

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Entity {
    Account,
    Session,
    OutboundGroup,
    InboundGroup,
    Pk,
}

#[derive(Debug, Clone, Arbitrary)]
enum Edit {
    Flip { position: u16, mask: u8 },
    Truncate { len: u16 },
    Extend { bytes: Vec<u8> },
}

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    entity: Entity,
    random: [u8; 160],
    edits: Vec<Edit>,
}

fn pickle(entity: Entity, random: &[u8; 160], key: &PickleKey) -> Vec<u8> {
    match entity {
        Entity::Account => Account::new_with_random(&random[..64]).expect("64 bytes").pickle(key),
        Entity::Session => {
            let alice = Account::new_with_random(&random[..64]).expect("64 bytes");
            let mut bob = Account::new_with_random(&random[64..128]).expect("64 bytes");
            let prekey = bob.generate_prekey_with_random(&random[128..160]).expect("32 bytes");
            let bob_keys = bob.identity_keys();
            Session::create_outbound_with_random(
                &alice,
                bob_keys.curve25519,
                &bob_keys.ed25519,
                &prekey,
                None,
                &random[..64],
            )
            .expect("valid prekey")
            .pickle(key)
        },
        Entity::OutboundGroup => {
            OutboundGroupSession::new_with_random(random).expect("160 bytes").pickle(key)
        },
        Entity::InboundGroup => {
            let outbound = OutboundGroupSession::new_with_random(random).expect("160 bytes");
            InboundGroupSession::new(&outbound.session_key()).expect("own session key").pickle(key)
        },
        Entity::Pk => PkDecryption::new_with_random(&random[..32]).expect("32 bytes").pickle(key),
    }
}

fn restores(entity: Entity, blob: &[u8], key: &PickleKey) -> bool {
    match entity {
        Entity::Account => Account::from_pickle(blob, key).is_ok(),
        Entity::Session => Session::from_pickle(blob, key).is_ok(),
        Entity::OutboundGroup => OutboundGroupSession::from_pickle(blob, key).is_ok(),
        Entity::InboundGroup => InboundGroupSession::from_pickle(blob, key).is_ok(),
        Entity::Pk => PkDecryption::from_pickle(blob, key).is_ok(),
    }
}

fuzz_target!(|scenario: Scenario| {
    let key = PickleKey::from_bytes([7u8; 32]);
    let original = pickle(scenario.entity, &scenario.random, &key);

    let mut blob = original.clone();
    for edit in scenario.edits.iter().take(16) {
        match edit {
            Edit::Flip { position, mask } => {
                if !blob.is_empty() {
                    let position = usize::from(*position) % blob.len();
                    blob[position] ^= mask;
                }
            },
            Edit::Truncate { len } => blob.truncate(usize::from(*len)),
            Edit::Extend { bytes } => blob.extend_from_slice(bytes),
        }
    }

    let restored = restores(scenario.entity, &blob, &key);
    assert_eq!(restored, blob == original, "{:?} with {:?}", scenario.entity, scenario.edits);
});
