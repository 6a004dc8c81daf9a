//! Simulation driver: real sessions over a simulated network.
//!
//! `SimDriver` owns both parties' accounts and sessions plus the wire between
//! them. It accepts the same [`Operation`]s as [`crate::ModelWorld`] and
//! reports results in the same vocabulary, so a test can run both side by
//! side and compare.

use tether_core::{Account, Environment, MessageType, OlmError, PickleKey, Session, SessionConfig};

use crate::{
    model::{Operation, OperationResult, Party},
    sim_env::SimEnv,
};

/// Ciphertext on the simulated wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    /// Type reported by the sender.
    pub message_type: MessageType,
    /// Encoded message.
    pub bytes: Vec<u8>,
}

/// Error setting up the conversation.
#[derive(Debug)]
pub struct SimDriverError(pub OlmError);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

impl From<OlmError> for SimDriverError {
    fn from(err: OlmError) -> Self {
        Self(err)
    }
}

/// Two real sessions and the network between them.
pub struct SimDriver {
    env: SimEnv,
    accounts: [Account; 2],
    sessions: [Session; 2],
    in_flight: [Vec<WireMessage>; 2],
    delivered: [Vec<WireMessage>; 2],
    pickle_key: PickleKey,
    handshake: WireMessage,
}

impl SimDriver {
    /// Run the handshake: Alice encrypts a first message to Bob's published
    /// keys and Bob creates his session from it.
    pub fn established(env: SimEnv, config: SessionConfig) -> Result<Self, SimDriverError> {
        let alice_account = Account::new(&env);
        let mut bob_account = Account::new(&env);
        let prekey = bob_account.generate_prekey(&env);
        bob_account.generate_one_time_keys(&env, 1);
        let one_time_key = bob_account.one_time_keys().pop_first().map(|(_, key)| key);
        bob_account.mark_keys_as_published();

        let bob_keys = bob_account.identity_keys();
        let mut alice = Session::create_outbound(
            &env,
            &alice_account,
            bob_keys.curve25519,
            &bob_keys.ed25519,
            &prekey,
            one_time_key,
        )?
        .with_config(config);

        let (message_type, bytes) = alice.encrypt(&env, b"handshake")?;
        let mut bob = Session::create_inbound(&bob_account, &bytes)?.with_config(config);
        bob.decrypt(message_type, &bytes)?;
        bob_account.remove_one_time_keys(&bob)?;

        tracing::debug!(
            seed = env.seed(),
            session = %alice.session_id(),
            "conversation established"
        );

        let mut key = [0u8; 32];
        env.random_bytes(&mut key);

        Ok(Self {
            env,
            accounts: [alice_account, bob_account],
            sessions: [alice, bob],
            in_flight: [Vec::new(), Vec::new()],
            delivered: [Vec::new(), Vec::new()],
            pickle_key: PickleKey::from_bytes(key),
            handshake: WireMessage { message_type, bytes },
        })
    }

    /// A party's session.
    pub fn session(&self, party: Party) -> &Session {
        &self.sessions[party.index()]
    }

    /// A party's account.
    pub fn account(&self, party: Party) -> &Account {
        &self.accounts[party.index()]
    }

    /// Alice's first message, as Bob received it.
    pub fn handshake(&self) -> &WireMessage {
        &self.handshake
    }

    /// Messages on the wire to `party`, in send order.
    pub fn in_flight(&self, party: Party) -> &[WireMessage] {
        &self.in_flight[party.index()]
    }

    /// Apply an operation to the real sessions.
    ///
    /// Encryption and pickling failures are returned as errors; they never
    /// happen in a healthy conversation. Decryption failures are part of the
    /// result.
    pub fn apply(&mut self, op: &Operation) -> Result<OperationResult, SimDriverError> {
        match op {
            Operation::Send { from, content } => {
                let (message_type, bytes) =
                    self.sessions[from.index()].encrypt(&self.env, &content.to_bytes())?;
                self.in_flight[from.peer().index()].push(WireMessage { message_type, bytes });
                Ok(OperationResult::Ok)
            },
            Operation::Deliver { to, pick } => {
                let queue = &mut self.in_flight[to.index()];
                if queue.is_empty() {
                    return Ok(OperationResult::NoOp);
                }
                let message = queue.remove(usize::from(*pick) % queue.len());
                Ok(self.deliver(*to, message))
            },
            Operation::DeliverAll { to } => {
                let queue = std::mem::take(&mut self.in_flight[to.index()]);
                for message in queue {
                    self.deliver(*to, message);
                }
                Ok(OperationResult::Ok)
            },
            Operation::Drop { to, pick } => {
                let queue = &mut self.in_flight[to.index()];
                if queue.is_empty() {
                    return Ok(OperationResult::NoOp);
                }
                queue.remove(usize::from(*pick) % queue.len());
                Ok(OperationResult::Ok)
            },
            Operation::Replay { to, pick } => {
                let log = &self.delivered[to.index()];
                if log.is_empty() {
                    return Ok(OperationResult::NoOp);
                }
                let message = log[usize::from(*pick) % log.len()].clone();
                Ok(self.deliver(*to, message))
            },
            Operation::Repickle { party } => {
                let session = &mut self.sessions[party.index()];
                let blob = session.pickle(&self.pickle_key);
                *session = Session::from_pickle(&blob, &self.pickle_key)?;
                Ok(OperationResult::Ok)
            },
        }
    }

    fn deliver(&mut self, to: Party, message: WireMessage) -> OperationResult {
        let result = self.sessions[to.index()].decrypt(message.message_type, &message.bytes);
        self.delivered[to.index()].push(message);

        match result {
            Ok(plaintext) => OperationResult::Decrypted(plaintext),
            Err(err) => {
                tracing::trace!(party = ?to, %err, fatal = err.is_fatal(), "delivery rejected");
                OperationResult::Rejected
            },
        }
    }
}

impl std::fmt::Debug for SimDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDriver")
            .field("env", &self.env)
            .field("alice", &self.sessions[0])
            .field("bob", &self.sessions[1])
            .finish_non_exhaustive()
    }
}
