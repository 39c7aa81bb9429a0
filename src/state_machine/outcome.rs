//! Call outcome derived from transition history

use super::state::Trigger;
use super::transition::TransitionRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Business outcome of a finished call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    MeetingBooked,
    VoicemailLeft,
    Disqualified,
    RejectedEarly,
    ObjectionUnresolved,
    Declined,
    Unknown,
}

/// Priority rules, first trigger present anywhere in the history wins.
///
/// An explicit commitment outranks every negative signal, wherever it sits in
/// the history. Keep this order.
const OUTCOME_RULES: [(Trigger, Outcome); 6] = [
    (Trigger::CommitmentYes, Outcome::MeetingBooked),
    (Trigger::NoAnswer, Outcome::VoicemailLeft),
    (Trigger::Disqualified, Outcome::Disqualified),
    (Trigger::NotInterestedEarly, Outcome::RejectedEarly),
    (Trigger::ObjectionUnresolved, Outcome::ObjectionUnresolved),
    (Trigger::CommitmentNo, Outcome::Declined),
];

impl Outcome {
    pub fn classify(history: &[TransitionRecord]) -> Self {
        OUTCOME_RULES
            .iter()
            .find(|(trigger, _)| history.iter().any(|r| r.trigger == *trigger))
            .map_or(Outcome::Unknown, |(_, outcome)| *outcome)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::MeetingBooked => "meeting_booked",
            Outcome::VoicemailLeft => "voicemail_left",
            Outcome::Disqualified => "disqualified",
            Outcome::RejectedEarly => "rejected_early",
            Outcome::ObjectionUnresolved => "objection_unresolved",
            Outcome::Declined => "declined",
            Outcome::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
