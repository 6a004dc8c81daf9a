//! Fuzz target for pairwise sessions over a hostile network
//!
//! Decodes an operation sequence (sends, reordered and dropped deliveries,
//! replays, pickle round trips) and applies it to both the reference model
//! and two real sessions.
//!
//! # Invariants
//!
//! - Every delivery decrypts or fails exactly when the model says so
//! - Decrypted plaintext is what the model says was sent
//! - Both parties' ratchet layouts match the model after every step

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tether_core::SessionConfig;
use tether_harness::{ModelWorld, Operation, Party, SimDriver, SimEnv};

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    seed: u64,
    tight_limits: bool,
    operations: Vec<Operation>,
}

fuzz_target!(|scenario: Scenario| {
    let config = if scenario.tight_limits {
        SessionConfig { max_receiver_chains: 2, max_skipped_message_keys: 4, max_message_gap: 6 }
    } else {
        SessionConfig::default()
    };

    let mut model = ModelWorld::established(config);
    let env = SimEnv::with_seed(scenario.seed);
    let mut real = SimDriver::established(env, config).expect("handshake succeeds");

    for op in scenario.operations.iter().take(256) {
        let expected = model.apply(op);
        let actual = real.apply(op).expect("encryption and pickling never fail");
        assert_eq!(expected, actual, "{op:?}");

        for party in [Party::Alice, Party::Bob] {
            assert_eq!(
                model.party(party).describe(),
                real.session(party).describe(),
                "{party:?} after {op:?}"
            );
        }
    }
});
