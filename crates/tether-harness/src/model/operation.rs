//! Operations for model-based testing.
//!
//! Operations represent every action on a two-party conversation over a
//! lossy, reordering network. They are generated randomly by proptest (or
//! decoded from fuzz input) and applied to both the model and the real
//! sessions.

use arbitrary::Arbitrary;

/// One side of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum Party {
    /// Initiator: created the outbound session.
    Alice,
    /// Responder: created the inbound session from Alice's first message.
    Bob,
}

impl Party {
    /// The other side.
    pub fn peer(self) -> Self {
        match self {
            Self::Alice => Self::Bob,
            Self::Bob => Self::Alice,
        }
    }

    /// Slot of this party in per-party arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Alice => 0,
            Self::Bob => 1,
        }
    }
}

/// Operations that can be applied to the conversation.
///
/// `pick` values select an entry from a queue modulo its length, so any byte
/// is a valid choice and shrinking stays meaningful.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Encrypt a message and put it on the wire to the peer.
    Send {
        /// Sender.
        from: Party,
        /// Message content.
        content: SmallMessage,
    },

    /// Deliver one in-flight message, in any order.
    Deliver {
        /// Recipient.
        to: Party,
        /// Which in-flight message.
        pick: u8,
    },

    /// Deliver every in-flight message in send order.
    DeliverAll {
        /// Recipient.
        to: Party,
    },

    /// Lose one in-flight message.
    Drop {
        /// Intended recipient.
        to: Party,
        /// Which in-flight message.
        pick: u8,
    },

    /// Deliver an already delivered message again.
    Replay {
        /// Recipient.
        to: Party,
        /// Which delivered message.
        pick: u8,
    },

    /// Persist a session and continue with the restored copy.
    Repickle {
        /// Whose session.
        party: Party,
    },
}

/// Outcome of an operation, compared between model and real sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded with nothing to report.
    Ok,
    /// A message was delivered and decrypted to this plaintext.
    Decrypted(Vec<u8>),
    /// A message was delivered and rejected.
    Rejected,
    /// Nothing to act on (empty queue).
    NoOp,
}

/// Small message content for testing.
///
/// A compact representation keeps test cases small while still exercising
/// padding boundaries. The content is deterministic from the seed.
#[derive(Debug, Clone, Arbitrary)]
pub struct SmallMessage {
    /// Message seed (expanded to content).
    pub seed: u8,
    /// Length class: empty, under a block, one block, several blocks.
    pub size_class: u8,
}

impl SmallMessage {
    /// Expand to actual message bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = match self.size_class % 4 {
            0 => 0,
            1 => 8,
            2 => 16,
            _ => 200,
        };

        (0..len).map(|i| self.seed.wrapping_add(i as u8)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peers_are_symmetric() {
        assert_eq!(Party::Alice.peer(), Party::Bob);
        assert_eq!(Party::Bob.peer().peer(), Party::Bob);
        assert_ne!(Party::Alice.index(), Party::Bob.index());
    }

    #[test]
    fn size_classes_cover_block_boundaries() {
        let lengths: Vec<_> = (0..4)
            .map(|size_class| SmallMessage { seed: 1, size_class }.to_bytes().len())
            .collect();
        assert_eq!(lengths, vec![0, 8, 16, 200]);
    }
}
