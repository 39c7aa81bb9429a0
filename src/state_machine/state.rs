//! Call state and trigger types

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Call State
// ============================================================================

/// Phase of an outbound call. Each phase gets its own prompt and its own
/// knowledge categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    Greeting,
    Rapport,
    Discovery,
    Pitch,
    Objection,
    Close,
    WrapUp,
    Voicemail,
    End,
}

impl CallState {
    pub const ALL: [CallState; 9] = [
        CallState::Greeting,
        CallState::Rapport,
        CallState::Discovery,
        CallState::Pitch,
        CallState::Objection,
        CallState::Close,
        CallState::WrapUp,
        CallState::Voicemail,
        CallState::End,
    ];

    /// State every fresh session starts in
    pub const INITIAL: CallState = CallState::Greeting;

    /// The only state without outgoing transitions
    pub const TERMINAL: CallState = CallState::End;

    pub fn as_str(self) -> &'static str {
        match self {
            CallState::Greeting => "GREETING",
            CallState::Rapport => "RAPPORT",
            CallState::Discovery => "DISCOVERY",
            CallState::Pitch => "PITCH",
            CallState::Objection => "OBJECTION",
            CallState::Close => "CLOSE",
            CallState::WrapUp => "WRAP_UP",
            CallState::Voicemail => "VOICEMAIL",
            CallState::End => "END",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::TERMINAL
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Trigger
// ============================================================================

/// Classification label the generation backend attaches to a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trigger {
    // Greeting
    CorrectPerson,
    WrongPerson,
    NotInterestedEarly,
    // Rapport
    RapportEstablished,
    // Discovery
    Qualified,
    Disqualified,
    // Pitch
    ObjectionRaised,
    BuyingSignal,
    // Objection
    ObjectionResolved,
    ObjectionUnresolved,
    // Close
    CommitmentYes,
    CommitmentNo,
    // Any state that can go unanswered
    NoAnswer,
    // Wrap up / voicemail
    WrapUpComplete,
}

impl Trigger {
    pub const ALL: [Trigger; 14] = [
        Trigger::CorrectPerson,
        Trigger::WrongPerson,
        Trigger::NotInterestedEarly,
        Trigger::RapportEstablished,
        Trigger::Qualified,
        Trigger::Disqualified,
        Trigger::ObjectionRaised,
        Trigger::BuyingSignal,
        Trigger::ObjectionResolved,
        Trigger::ObjectionUnresolved,
        Trigger::CommitmentYes,
        Trigger::CommitmentNo,
        Trigger::NoAnswer,
        Trigger::WrapUpComplete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::CorrectPerson => "CORRECT_PERSON",
            Trigger::WrongPerson => "WRONG_PERSON",
            Trigger::NotInterestedEarly => "NOT_INTERESTED_EARLY",
            Trigger::RapportEstablished => "RAPPORT_ESTABLISHED",
            Trigger::Qualified => "QUALIFIED",
            Trigger::Disqualified => "DISQUALIFIED",
            Trigger::ObjectionRaised => "OBJECTION_RAISED",
            Trigger::BuyingSignal => "BUYING_SIGNAL",
            Trigger::ObjectionResolved => "OBJECTION_RESOLVED",
            Trigger::ObjectionUnresolved => "OBJECTION_UNRESOLVED",
            Trigger::CommitmentYes => "COMMITMENT_YES",
            Trigger::CommitmentNo => "COMMITMENT_NO",
            Trigger::NoAnswer => "NO_ANSWER",
            Trigger::WrapUpComplete => "WRAP_UP_COMPLETE",
        }
    }

    /// Exact, case-sensitive lookup by wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Trigger Label - parsed classifier output
// ============================================================================

/// Wire name of the "stay in the current state" sentinel
pub const NO_TRANSITION: &str = "NONE";

/// Result of parsing the classifier's trigger field.
///
/// Parsing never fails: anything that is not the sentinel or a known
/// trigger name ends up in `Unrecognized` so callers can count it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerLabel {
    NoTransition,
    Trigger(Trigger),
    Unrecognized(String),
}

impl TriggerLabel {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == NO_TRANSITION {
            return TriggerLabel::NoTransition;
        }
        match Trigger::from_name(raw) {
            Some(trigger) => TriggerLabel::Trigger(trigger),
            None => TriggerLabel::Unrecognized(raw.to_string()),
        }
    }

    pub fn trigger(&self) -> Option<Trigger> {
        match self {
            TriggerLabel::Trigger(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerLabel::NoTransition => f.write_str(NO_TRANSITION),
            TriggerLabel::Trigger(t) => t.fmt(f),
            TriggerLabel::Unrecognized(raw) => write!(f, "{raw} (unrecognized)"),
        }
    }
}
