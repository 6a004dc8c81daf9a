//! Fuzz target for the Megolm ratchet
//!
//! # Strategy
//!
//! - Arbitrary initial ratchet state and counter
//! - Random sequences of single steps and jumps
//!
//! # Invariants
//!
//! - advance_to(n) produces the same state as stepping one at a time
//! - The counter always lands exactly on the requested index
//! - The same state always derives the same cipher keys

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tether_crypto::{Megolm, MEGOLM_RATCHET_LENGTH};

#[derive(Debug, Clone, Arbitrary)]
struct RatchetScenario {
    initial: [u8; MEGOLM_RATCHET_LENGTH],
    counter: u32,
    operations: Vec<RatchetOperation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum RatchetOperation {
    /// One step
    Advance,
    /// Jump ahead by a small amount, checked against single steps
    Skip { steps: u8 },
    /// Jump ahead by an arbitrary amount, checked only for the landing index
    Jump { delta: u32 },
}

fuzz_target!(|scenario: RatchetScenario| {
    let mut ratchet = Megolm::new(&scenario.initial, scenario.counter);

    for op in scenario.operations.iter().take(64) {
        match op {
            RatchetOperation::Advance => {
                let before = ratchet.index();
                ratchet.advance();
                assert_eq!(ratchet.index(), before.wrapping_add(1));
            },
            RatchetOperation::Skip { steps } => {
                let target = ratchet.index().wrapping_add(u32::from(*steps));

                let mut stepped = ratchet.clone();
                for _ in 0..*steps {
                    stepped.advance();
                }
                ratchet.advance_to(target);

                assert_eq!(ratchet.index(), target);
                assert_eq!(
                    ratchet.to_bytes(),
                    stepped.to_bytes(),
                    "advance_to diverged at {target}"
                );
            },
            RatchetOperation::Jump { delta } => {
                let target = ratchet.index().wrapping_add(*delta);
                ratchet.advance_to(target);
                assert_eq!(ratchet.index(), target);
            },
        }

        let again = Megolm::new(&ratchet.to_bytes(), ratchet.index());
        assert_eq!(
            again.cipher_keys().mac(b"sample"),
            ratchet.cipher_keys().mac(b"sample"),
            "cipher keys are not a function of the state"
        );
    }
});
