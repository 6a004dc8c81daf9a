//! Model world: the reference ratchet bookkeeping for two parties.
//!
//! The model tracks which chain and index every message was sent on, and
//! what each receiver still holds (chain positions, skipped keys, chains it
//! has accepted). It never touches key material. It is the oracle against
//! which the real sessions are verified, down to the output of
//! `Session::describe`.

use std::collections::{BTreeSet, VecDeque};

use tether_core::SessionConfig;

use super::operation::{Operation, OperationResult, Party};

/// Identifies a sending chain across the whole conversation.
pub type ChainId = u32;

/// A message on the model wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMessage {
    /// Sending chain the message was encrypted on.
    pub chain: ChainId,
    /// Index on that chain.
    pub index: u32,
    /// Plaintext.
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChainPosition {
    chain: ChainId,
    next: u32,
}

/// One party's ratchet bookkeeping.
#[derive(Debug, Clone)]
pub struct ModelParty {
    sender: Option<ChainPosition>,
    receivers: VecDeque<ChainPosition>,
    skipped: VecDeque<(ChainId, u32)>,
    accepted: BTreeSet<ChainId>,
}

impl ModelParty {
    /// Same format as `Session::describe`.
    pub fn describe(&self) -> String {
        let sender = self.sender.map_or_else(|| "none".to_owned(), |chain| chain.next.to_string());
        let receivers: Vec<String> =
            self.receivers.iter().map(|chain| chain.next.to_string()).collect();
        format!(
            "sender chain index: {sender} receiver chain indices: [{}] skipped message keys: {}",
            receivers.join(", "),
            self.skipped.len()
        )
    }

    /// Number of skipped keys held.
    pub fn skipped_keys(&self) -> usize {
        self.skipped.len()
    }

    /// Number of receiving chains held.
    pub fn receiver_chains(&self) -> usize {
        self.receivers.len()
    }

    fn receive(&mut self, message: &ModelMessage, config: &SessionConfig) -> Option<Vec<u8>> {
        let position = match self.receivers.iter().position(|chain| chain.chain == message.chain) {
            Some(position) => position,
            None => {
                // An evicted chain no longer derives from the current root.
                if self.accepted.contains(&message.chain)
                    || self.sender.is_none()
                    || message.index > config.max_message_gap
                {
                    return None;
                }
                self.sender = None;
                self.accepted.insert(message.chain);
                self.receivers.push_front(ChainPosition { chain: message.chain, next: 0 });
                self.receivers.truncate(config.max_receiver_chains.max(1));
                0
            },
        };

        let chain = &mut self.receivers[position];
        if message.index < chain.next {
            let slot = self.skipped.iter().position(|&key| key == (message.chain, message.index))?;
            self.skipped.remove(slot);
            return Some(message.content.clone());
        }
        if message.index - chain.next > config.max_message_gap {
            return None;
        }

        let skipped = chain.next..message.index;
        chain.next = message.index + 1;
        for index in skipped {
            self.skipped.push_back((message.chain, index));
            if self.skipped.len() > config.max_skipped_message_keys {
                self.skipped.pop_front();
            }
        }
        Some(message.content.clone())
    }
}

/// Model world: two parties and the wire between them.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    parties: [ModelParty; 2],
    in_flight: [Vec<ModelMessage>; 2],
    delivered: [Vec<ModelMessage>; 2],
    next_chain: ChainId,
    config: SessionConfig,
}

impl ModelWorld {
    /// World right after Bob decrypted Alice's first (handshake) message.
    ///
    /// Chain 0 is Alice's handshake chain; both sides have used index 0.
    pub fn established(config: SessionConfig) -> Self {
        let alice = ModelParty {
            sender: Some(ChainPosition { chain: 0, next: 1 }),
            receivers: VecDeque::new(),
            skipped: VecDeque::new(),
            accepted: BTreeSet::new(),
        };
        let bob = ModelParty {
            sender: None,
            receivers: VecDeque::from([ChainPosition { chain: 0, next: 1 }]),
            skipped: VecDeque::new(),
            accepted: BTreeSet::from([0]),
        };

        Self {
            parties: [alice, bob],
            in_flight: [Vec::new(), Vec::new()],
            delivered: [Vec::new(), Vec::new()],
            next_chain: 1,
            config,
        }
    }

    /// A party's bookkeeping.
    pub fn party(&self, party: Party) -> &ModelParty {
        &self.parties[party.index()]
    }

    /// Messages on the wire to `party`, in send order.
    pub fn in_flight(&self, party: Party) -> &[ModelMessage] {
        &self.in_flight[party.index()]
    }

    /// Apply an operation and return the result the real sessions must match.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Send { from, content } => {
                self.send(*from, content.to_bytes());
                OperationResult::Ok
            },
            Operation::Deliver { to, pick } => {
                let queue = &mut self.in_flight[to.index()];
                if queue.is_empty() {
                    return OperationResult::NoOp;
                }
                let message = queue.remove(usize::from(*pick) % queue.len());
                self.deliver(*to, message)
            },
            Operation::DeliverAll { to } => {
                let queue = std::mem::take(&mut self.in_flight[to.index()]);
                for message in queue {
                    self.deliver(*to, message);
                }
                OperationResult::Ok
            },
            Operation::Drop { to, pick } => {
                let queue = &mut self.in_flight[to.index()];
                if queue.is_empty() {
                    return OperationResult::NoOp;
                }
                queue.remove(usize::from(*pick) % queue.len());
                OperationResult::Ok
            },
            Operation::Replay { to, pick } => {
                let log = &self.delivered[to.index()];
                if log.is_empty() {
                    return OperationResult::NoOp;
                }
                let message = log[usize::from(*pick) % log.len()].clone();
                self.deliver(*to, message)
            },
            Operation::Repickle { .. } => OperationResult::Ok,
        }
    }

    fn send(&mut self, from: Party, content: Vec<u8>) {
        let next_chain = &mut self.next_chain;
        let sender = &mut self.parties[from.index()];
        let chain = sender.sender.get_or_insert_with(|| {
            let chain = *next_chain;
            *next_chain += 1;
            ChainPosition { chain, next: 0 }
        });

        let message = ModelMessage { chain: chain.chain, index: chain.next, content };
        chain.next += 1;
        self.in_flight[from.peer().index()].push(message);
    }

    fn deliver(&mut self, to: Party, message: ModelMessage) -> OperationResult {
        let mut next = self.parties[to.index()].clone();
        let result = next.receive(&message, &self.config);
        self.delivered[to.index()].push(message);

        match result {
            Some(plaintext) => {
                self.parties[to.index()] = next;
                OperationResult::Decrypted(plaintext)
            },
            None => OperationResult::Rejected,
        }
    }
}
