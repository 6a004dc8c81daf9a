//! Reference model for model-based testing.
//!
//! Operations are applied to both the [`ModelWorld`] and the real sessions
//! (through [`crate::SimDriver`]); their results and observable states must
//! match after every step.

mod operation;
mod world;

pub use operation::{Operation, OperationResult, Party, SmallMessage};
pub use world::{ChainId, ModelMessage, ModelParty, ModelWorld};
