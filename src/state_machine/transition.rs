//! Transition table for the call flow
//!
//! Any `(CallState, Trigger)` pair missing from the table is an illegal move.

use super::state::{CallState, Trigger};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Legal moves: `(from, trigger) -> to`
pub type TransitionTable = HashMap<(CallState, Trigger), CallState>;

/// One applied transition, appended to the machine history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: CallState,
    pub trigger: Trigger,
    pub to: CallState,
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error(
        "Invalid transition: {state} + {trigger}. Valid triggers from {state}: [{}]",
        trigger_list(.valid)
    )]
    InvalidTransition {
        state: CallState,
        trigger: Trigger,
        valid: Vec<Trigger>,
    },
}

fn trigger_list(triggers: &[Trigger]) -> String {
    triggers
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the table for the standard outbound call flow.
pub fn standard_table() -> TransitionTable {
    use CallState as S;
    use Trigger as T;

    let mut t = HashMap::new();

    // ── GREETING ─────────────────────────────────────────
    t.insert((S::Greeting, T::CorrectPerson), S::Rapport);
    t.insert((S::Greeting, T::WrongPerson), S::WrapUp);
    t.insert((S::Greeting, T::NotInterestedEarly), S::WrapUp);
    t.insert((S::Greeting, T::NoAnswer), S::Voicemail);

    // ── RAPPORT ──────────────────────────────────────────
    t.insert((S::Rapport, T::RapportEstablished), S::Discovery);
    t.insert((S::Rapport, T::NotInterestedEarly), S::WrapUp);

    // ── DISCOVERY ────────────────────────────────────────
    t.insert((S::Discovery, T::Qualified), S::Pitch);
    t.insert((S::Discovery, T::Disqualified), S::WrapUp);
    t.insert((S::Discovery, T::ObjectionRaised), S::Objection);

    // ── PITCH ────────────────────────────────────────────
    t.insert((S::Pitch, T::ObjectionRaised), S::Objection);
    t.insert((S::Pitch, T::BuyingSignal), S::Close);

    // ── OBJECTION ────────────────────────────────────────
    t.insert((S::Objection, T::ObjectionResolved), S::Pitch);
    t.insert((S::Objection, T::BuyingSignal), S::Close);
    t.insert((S::Objection, T::ObjectionUnresolved), S::WrapUp);

    // ── CLOSE ────────────────────────────────────────────
    t.insert((S::Close, T::CommitmentYes), S::WrapUp);
    t.insert((S::Close, T::CommitmentNo), S::WrapUp);
    t.insert((S::Close, T::ObjectionRaised), S::Objection);

    // ── WRAP_UP / VOICEMAIL ──────────────────────────────
    t.insert((S::WrapUp, T::WrapUpComplete), S::End);
    t.insert((S::Voicemail, T::WrapUpComplete), S::End);

    // END is terminal: no outgoing transitions.

    t
}
