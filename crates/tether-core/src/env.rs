//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (wall clock, randomness).
//! Every operation that consumes randomness has a pure `*_with_random` form
//! taking caller-supplied bytes; the convenience forms draw those bytes from
//! an [`Environment`]. Tests use a seeded environment so whole conversations
//! replay byte-for-byte.

use crate::error::{OlmError, Result};

/// Abstract environment providing wall-clock time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Seconds since the Unix epoch.
    ///
    /// Only used for bookkeeping (prekey publication time), never for any
    /// cryptographic decision.
    fn wall_clock_secs(&self) -> u64;

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Production environment using the system clock and OS RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. Key generation without functioning
/// cryptographic randomness cannot be done securely, so there is nothing
/// useful to return to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}

/// Check that `random` holds at least `needed` bytes.
pub(crate) fn require_random(random: &[u8], needed: usize) -> Result<()> {
    if random.len() < needed {
        return Err(OlmError::InsufficientRandomness { needed, got: random.len() });
    }
    Ok(())
}

/// Copy the 32 bytes at `offset` out of a buffer already checked by
/// [`require_random`].
pub(crate) fn take_32(random: &[u8], offset: usize) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&random[offset..offset + 32]);
    out
}
