//! Call flow state machine
//!
//! Static transition table and per-state configuration, validated together,
//! plus the per-session machine that walks them.

pub mod config;
mod machine;
pub mod outcome;
pub mod state;
pub mod transition;

#[cfg(test)]
mod proptests;

pub use config::{CallFlow, ConfigurationError, StateConfig};
pub use machine::StateMachine;
pub use outcome::Outcome;
pub use state::{CallState, Trigger, TriggerLabel};
pub use transition::{TransitionError, TransitionRecord};
