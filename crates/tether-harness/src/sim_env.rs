//! Seeded environment for deterministic simulation.
//!
//! Every random byte comes from one ChaCha20 stream, so a whole conversation
//! is a pure function of its seed. Clones share the stream: two parties
//! driven by clones of one `SimEnv` interleave their draws in call order.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tether_core::Environment;

/// Simulation start time: 2023-11-14T22:13:20Z.
const EPOCH_SECS: u64 = 1_700_000_000;

/// Deterministic [`Environment`] backed by a seeded RNG and a manual clock.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    clock: Arc<AtomicU64>,
    seed: u64,
}

impl SimEnv {
    /// Create an environment whose randomness is derived from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            clock: Arc::new(AtomicU64::new(EPOCH_SECS)),
            seed,
        }
    }

    /// Seed this environment was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Move the wall clock forward.
    pub fn advance_time(&self, secs: u64) {
        self.clock.fetch_add(secs, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv")
            .field("seed", &self.seed)
            .field("clock", &self.clock.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        // A panic elsewhere in a test must not wedge the stream.
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }

    fn wall_clock_secs(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }
}
