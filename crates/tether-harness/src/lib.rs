//! Deterministic simulation harness for tether session testing.
//!
//! A seeded [`SimEnv`] makes every conversation a pure function of its seed.
//! [`SimDriver`] runs two real sessions over a simulated network that can
//! delay, reorder, drop and replay messages.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the ratchet
//! bookkeeping. Operations are applied to both the model and the real
//! sessions, and their results and observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_driver;
pub mod sim_env;

pub use model::{
    ChainId, ModelMessage, ModelParty, ModelWorld, Operation, OperationResult, Party, SmallMessage,
};
pub use sim_driver::{SimDriver, SimDriverError, WireMessage};
pub use sim_env::SimEnv;
