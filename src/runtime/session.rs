//! Call session data: context, turn log and summary

use crate::state_machine::{CallFlow, CallState, Outcome, StateMachine, TransitionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Who is calling whom. Filled from CRM data in production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallContext {
    pub agent_name: String,
    pub company_name: String,
    pub product_name: String,

    pub prospect_name: String,
    pub prospect_title: String,
    pub prospect_company: String,
    pub prospect_industry: String,
    pub prospect_company_size: String,

    pub personalization_hook: String,
    pub pain_hypothesis: String,
}

impl Default for CallContext {
    fn default() -> Self {
        Self {
            agent_name: "Sarah".to_string(),
            company_name: "SalesPilot".to_string(),
            product_name: "SalesPilot AI, an AI-powered outbound sales platform".to_string(),
            prospect_name: "James".to_string(),
            prospect_title: "VP Sales".to_string(),
            prospect_company: "TechCorp".to_string(),
            prospect_industry: "SaaS".to_string(),
            prospect_company_size: "50".to_string(),
            personalization_hook: "Recently posted 3 SDR job openings on LinkedIn".to_string(),
            pain_hypothesis: "Scaling outbound is hard with a small team".to_string(),
        }
    }
}

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Prospect,
    Agent,
}

/// One utterance in the call log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub message: String,
    /// Prospect turns carry the state they were spoken in, agent turns the
    /// state after the turn was processed
    pub state: CallState,
}

/// One live call
#[derive(Debug)]
pub struct CallSession {
    id: String,
    context: CallContext,
    machine: StateMachine,
    turns: Vec<ConversationTurn>,
    opened: bool,
    created_at: DateTime<Utc>,
    ended_at: Option<Instant>,
}

impl CallSession {
    pub fn new(id: impl Into<String>, context: CallContext, flow: Arc<CallFlow>) -> Self {
        Self {
            id: id.into(),
            context,
            machine: StateMachine::new(flow),
            turns: Vec::new(),
            opened: false,
            created_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &CallContext {
        &self.context
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub(crate) fn machine_mut(&mut self) -> &mut StateMachine {
        &mut self.machine
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn current_state(&self) -> CallState {
        self.machine.current_state()
    }

    pub fn is_terminal(&self) -> bool {
        self.machine.is_terminal()
    }

    /// Whether the opening line has been generated
    pub fn is_opened(&self) -> bool {
        self.opened
    }

    pub(crate) fn mark_opened(&mut self) {
        self.opened = true;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn mark_ended(&mut self) {
        self.ended_at.get_or_insert_with(Instant::now);
    }

    /// Whether the call ended at least `retention` ago
    pub fn ended_before(&self, retention: std::time::Duration) -> bool {
        self.ended_at.is_some_and(|at| at.elapsed() >= retention)
    }

    /// Append a turn tagged with the current state
    pub(crate) fn record(&mut self, role: Role, message: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role,
            message: message.into(),
            state: self.machine.current_state(),
        });
    }

    pub fn summary(&self) -> CallSummary {
        let history = self.machine.history();
        CallSummary {
            prospect: ProspectSummary {
                name: self.context.prospect_name.clone(),
                title: self.context.prospect_title.clone(),
                company: self.context.prospect_company.clone(),
            },
            outcome: Outcome::classify(history),
            total_turns: self.turns.len(),
            states_visited: history.iter().map(|r| r.from).collect(),
            transitions: history.to_vec(),
            conversation: self.turns.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectSummary {
    pub name: String,
    pub title: String,
    pub company: String,
}

/// Post-call record for logging and CRM export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub prospect: ProspectSummary,
    pub outcome: Outcome,
    /// Number of logged utterances, both speakers
    pub total_turns: usize,
    /// Origin state of each transition, in order
    pub states_visited: Vec<CallState>,
    pub transitions: Vec<TransitionRecord>,
    pub conversation: Vec<ConversationTurn>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::Trigger;

    fn session() -> CallSession {
        let flow = Arc::new(CallFlow::standard().unwrap());
        CallSession::new("s-1", CallContext::default(), flow)
    }

    #[test]
    fn test_new_session_starts_in_initial_state() {
        let s = session();
        assert_eq!(s.current_state(), CallState::INITIAL);
        assert!(s.turns().is_empty());
        assert!(!s.is_opened());
        assert!(!s.is_terminal());
    }

    #[test]
    fn test_record_tags_current_state() {
        let mut s = session();
        s.record(Role::Prospect, "Yes, speaking");
        s.machine_mut().transition(Trigger::CorrectPerson).unwrap();
        s.record(Role::Agent, "Great!");

        assert_eq!(s.turns()[0].state, CallState::Greeting);
        assert_eq!(s.turns()[1].state, CallState::Rapport);
    }

    #[test]
    fn test_summary_shape() {
        let mut s = session();
        s.record(Role::Agent, "Hi, is this James?");
        s.record(Role::Prospect, "Yes");
        s.machine_mut().transition(Trigger::CorrectPerson).unwrap();
        s.machine_mut().transition(Trigger::NotInterestedEarly).unwrap();
        s.record(Role::Agent, "Understood, thanks.");

        let summary = s.summary();
        assert_eq!(summary.outcome, Outcome::RejectedEarly);
        assert_eq!(summary.total_turns, 3);
        assert_eq!(
            summary.states_visited,
            vec![CallState::Greeting, CallState::Rapport]
        );

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["prospect"]["name"], "James");
        assert_eq!(json["outcome"], "rejected_early");
        assert_eq!(json["transitions"][1]["trigger"], "NOT_INTERESTED_EARLY");
        assert_eq!(json["transitions"][1]["to"], "WRAP_UP");
        assert_eq!(json["conversation"][0]["role"], "agent");
        assert_eq!(json["conversation"][2]["state"], "WRAP_UP");
    }

    #[test]
    fn test_context_partial_json_uses_defaults() {
        let ctx: CallContext =
            serde_json::from_str(r#"{"prospect_name": "Dana", "prospect_company": "Acme"}"#)
                .unwrap();
        assert_eq!(ctx.prospect_name, "Dana");
        assert_eq!(ctx.agent_name, "Sarah");
    }
}
