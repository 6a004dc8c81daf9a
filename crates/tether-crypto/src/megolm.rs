//! Megolm group hash ratchet
//!
//! The ratchet state is four 32-byte parts `R0..R3` and a 32-bit counter.
//! Part `Ri` is rehashed every `2^(8 * (3 - i))` steps:
//!
//! ```text
//! R0 ── every 2^24 ──► R0, R1, R2, R3 reseeded from R0
//! R1 ── every 2^16 ──► R1, R2, R3 reseeded from R1
//! R2 ── every 2^8  ──► R2, R3 reseeded from R2
//! R3 ── every step ──► R3 rehashed
//! ```
//!
//! Rehashing is `Rj = HMAC-SHA256(Ri, [j])`. A receiver holding the state at
//! index `i` can reach any later index in at most `4 * 255` hashes, but can
//! never recover an earlier one.
//!
//! # Invariants
//!
//! - `advance_to(n)` produces exactly the state `n - index` calls to
//!   `advance` would
//! - The message key for index `i` depends on all 128 bytes of state

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{cipher::CipherKeys, kdf::hmac_sha256};

/// Number of ratchet parts
pub const MEGOLM_RATCHET_PARTS: usize = 4;

/// Length of each ratchet part
pub const MEGOLM_RATCHET_PART_LENGTH: usize = 32;

/// Length of the serialized ratchet state
pub const MEGOLM_RATCHET_LENGTH: usize = MEGOLM_RATCHET_PARTS * MEGOLM_RATCHET_PART_LENGTH;

/// Label used to expand the ratchet into cipher keys
pub const MEGOLM_KEY_INFO: &[u8] = b"MEGOLM_KEYS";

/// Megolm ratchet state.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Megolm {
    parts: [[u8; MEGOLM_RATCHET_PART_LENGTH]; MEGOLM_RATCHET_PARTS],
    counter: u32,
}

impl Megolm {
    /// Seed a ratchet from 128 bytes of random data at `counter`.
    pub fn new(random: &[u8; MEGOLM_RATCHET_LENGTH], counter: u32) -> Self {
        let mut parts = [[0u8; MEGOLM_RATCHET_PART_LENGTH]; MEGOLM_RATCHET_PARTS];
        for (part, chunk) in parts.iter_mut().zip(random.chunks_exact(MEGOLM_RATCHET_PART_LENGTH)) {
            part.copy_from_slice(chunk);
        }
        Self { parts, counter }
    }

    /// Current message index.
    pub fn index(&self) -> u32 {
        self.counter
    }

    /// Serialized ratchet parts `R0 || R1 || R2 || R3`.
    pub fn to_bytes(&self) -> [u8; MEGOLM_RATCHET_LENGTH] {
        let mut bytes = [0u8; MEGOLM_RATCHET_LENGTH];
        for (chunk, part) in bytes.chunks_exact_mut(MEGOLM_RATCHET_PART_LENGTH).zip(&self.parts) {
            chunk.copy_from_slice(part);
        }
        bytes
    }

    /// Cipher keys for the current index.
    pub fn cipher_keys(&self) -> CipherKeys {
        let mut bytes = self.to_bytes();
        let keys = CipherKeys::derive(&bytes, MEGOLM_KEY_INFO);
        bytes.zeroize();
        keys
    }

    /// Advance by one step.
    ///
    /// The counter wraps from `u32::MAX` to 0, matching the wire index
    /// width. The wrap is a full reseed from `R0`, so the state never repeats,
    /// but index 0 is reused: a receiver that has already passed an index
    /// cannot decrypt the wrapped messages.
    pub fn advance(&mut self) {
        self.counter = self.counter.wrapping_add(1);

        // Find the highest-order part whose period divides the new counter.
        let mut mask: u32 = 0x00FF_FFFF;
        let mut from = 0;
        while from < MEGOLM_RATCHET_PARTS {
            if self.counter & mask == 0 {
                break;
            }
            from += 1;
            mask >>= 8;
        }

        // Reseed lower-order parts first so `from` is read before it changes.
        for to in (from..MEGOLM_RATCHET_PARTS).rev() {
            self.rehash(from, to);
        }
    }

    /// Advance to `target`, wrapping if `target` is below the current index.
    pub fn advance_to(&mut self, target: u32) {
        for from in 0..MEGOLM_RATCHET_PARTS {
            let shift = (MEGOLM_RATCHET_PARTS - 1 - from) * 8;
            let mask = !0u32 << shift;

            let mut steps = (target >> shift).wrapping_sub(self.counter >> shift) & 0xFF;
            if steps == 0 {
                if target < self.counter {
                    steps = 0x100;
                } else {
                    continue;
                }
            }

            // All but the last step only touch this part; the last one also
            // reseeds every lower-order part.
            for _ in 1..steps {
                self.rehash(from, from);
            }
            for to in (from..MEGOLM_RATCHET_PARTS).rev() {
                self.rehash(from, to);
            }

            self.counter = target & mask;
        }
    }

    fn rehash(&mut self, from: usize, to: usize) {
        let mut next = hmac_sha256(&self.parts[from], &[to as u8]);
        self.parts[to].copy_from_slice(&next);
        next.zeroize();
    }
}

impl std::fmt::Debug for Megolm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Megolm").field("counter", &self.counter).finish_non_exhaustive()
    }
}
