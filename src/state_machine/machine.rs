//! Per-session state machine
//!
//! Tracks the current state, the transition history and the number of agent
//! turns spent in the current state.

use super::config::{CallFlow, StateConfig};
use super::state::{CallState, Trigger};
use super::transition::{TransitionError, TransitionRecord};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct StateMachine {
    flow: Arc<CallFlow>,
    current: CallState,
    history: Vec<TransitionRecord>,
    turns_in_state: u32,
}

impl StateMachine {
    /// Fresh machine in the initial state
    pub fn new(flow: Arc<CallFlow>) -> Self {
        Self {
            flow,
            current: CallState::INITIAL,
            history: Vec::new(),
            turns_in_state: 0,
        }
    }

    pub fn current_state(&self) -> CallState {
        self.current
    }

    /// Config of the current state
    pub fn config(&self) -> &StateConfig {
        self.flow.config(self.current)
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Triggers the generation backend may pick from in the current state
    pub fn valid_triggers(&self) -> &[Trigger] {
        &self.config().allowed_triggers
    }

    /// Check if a trigger is legal without applying it
    pub fn can_transition(&self, trigger: Trigger) -> bool {
        self.flow.destination(self.current, trigger).is_some()
    }

    /// Apply a trigger and move to the next state.
    ///
    /// An illegal trigger leaves state, history and turn counter untouched.
    pub fn transition(&mut self, trigger: Trigger) -> Result<CallState, TransitionError> {
        let Some(to) = self.flow.destination(self.current, trigger) else {
            return Err(TransitionError::InvalidTransition {
                state: self.current,
                trigger,
                valid: self.valid_triggers().to_vec(),
            });
        };

        self.history.push(TransitionRecord {
            from: self.current,
            trigger,
            to,
        });
        self.current = to;
        self.turns_in_state = 0;

        Ok(to)
    }

    /// Count one agent turn in the current state.
    ///
    /// Once the turn budget is reached and the state has a legal timeout
    /// trigger, that transition is applied and the new state returned.
    /// Returns `None` if no timeout fired.
    pub fn record_turn(&mut self) -> Option<CallState> {
        self.turns_in_state += 1;
        if !self.turn_budget_exhausted() {
            return None;
        }

        let timeout = self.config().timeout_trigger?;
        if !self.can_transition(timeout) {
            return None;
        }

        tracing::debug!(
            state = %self.current,
            trigger = %timeout,
            turns = self.turns_in_state,
            "Turn budget exhausted, applying timeout trigger"
        );
        self.transition(timeout).ok()
    }

    /// True once the current state has used up its turn budget
    pub fn turn_budget_exhausted(&self) -> bool {
        self.turns_in_state >= self.config().max_turns
    }

    pub fn turns_in_state(&self) -> u32 {
        self.turns_in_state
    }

    /// Transitions applied so far, oldest first
    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }
}
