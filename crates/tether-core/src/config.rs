//! Session limits

/// Default number of receiving chains kept per session.
pub const DEFAULT_MAX_RECEIVER_CHAINS: usize = 5;

/// Default number of skipped message keys kept per session.
pub const DEFAULT_MAX_SKIPPED_MESSAGE_KEYS: usize = 40;

/// Default maximum number of chain steps a single message may skip.
pub const DEFAULT_MAX_MESSAGE_GAP: u32 = 2000;

/// Bounds on the memory and work a session spends tolerating reordering.
///
/// Stored in every session and persisted in its pickle, so a restored
/// session keeps the limits it was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Receiving chains kept before the oldest is evicted
    pub max_receiver_chains: usize,
    /// Skipped message keys kept before the oldest is evicted
    pub max_skipped_message_keys: usize,
    /// Maximum chain steps one message may skip (the skip window)
    pub max_message_gap: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_receiver_chains: DEFAULT_MAX_RECEIVER_CHAINS,
            max_skipped_message_keys: DEFAULT_MAX_SKIPPED_MESSAGE_KEYS,
            max_message_gap: DEFAULT_MAX_MESSAGE_GAP,
        }
    }
}
