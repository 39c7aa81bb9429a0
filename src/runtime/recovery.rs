//! Stuck-state recovery
//!
//! Decides whether a call that has spent its whole turn budget in one state
//! should be pushed forward by a fallback trigger.

use crate::state_machine::{CallState, StateMachine, Trigger};

/// Fallback trigger per state
pub fn fallback_trigger(state: CallState) -> Option<Trigger> {
    match state {
        CallState::Rapport => Some(Trigger::RapportEstablished),
        CallState::Discovery => Some(Trigger::Qualified),
        CallState::Pitch => Some(Trigger::BuyingSignal),
        CallState::Objection => Some(Trigger::ObjectionUnresolved),
        CallState::Close => Some(Trigger::CommitmentNo),
        CallState::Greeting
        | CallState::WrapUp
        | CallState::Voicemail
        | CallState::End => None,
    }
}

/// Result of checking a machine for a stuck state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryDecision {
    /// Trigger to apply, if any
    pub trigger: Option<Trigger>,
    /// Reason for the decision (for debugging)
    pub reason: RecoveryReason,
}

/// Why we made a particular recovery decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryReason {
    /// Call already ended
    Terminal,
    /// The timeout transition already moved the call this turn
    TimeoutFired,
    /// State still has turns left
    BudgetRemaining,
    /// State has no fallback trigger
    NoFallback,
    /// Fallback exists but is not a legal move from this state
    FallbackIllegal,
    /// Fallback should be applied
    Stuck,
}

impl RecoveryDecision {
    fn keep(reason: RecoveryReason) -> Self {
        Self {
            trigger: None,
            reason,
        }
    }
}

/// Decide whether to force a transition after this turn was counted.
///
/// Only a non-terminal state whose budget is used up, on a turn where the
/// timeout did not fire, is eligible. The fallback is returned only if it is
/// legal from the current state.
pub fn check_stuck(machine: &StateMachine, timeout_fired: bool) -> RecoveryDecision {
    if machine.is_terminal() {
        return RecoveryDecision::keep(RecoveryReason::Terminal);
    }
    if timeout_fired {
        return RecoveryDecision::keep(RecoveryReason::TimeoutFired);
    }
    if !machine.turn_budget_exhausted() {
        return RecoveryDecision::keep(RecoveryReason::BudgetRemaining);
    }

    let Some(trigger) = fallback_trigger(machine.current_state()) else {
        return RecoveryDecision::keep(RecoveryReason::NoFallback);
    };
    if !machine.can_transition(trigger) {
        return RecoveryDecision::keep(RecoveryReason::FallbackIllegal);
    }

    RecoveryDecision {
        trigger: Some(trigger),
        reason: RecoveryReason::Stuck,
    }
}
