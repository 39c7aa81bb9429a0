//! Per-state configuration and the validated call flow
//!
//! A `CallFlow` can only be obtained through [`CallFlow::new`], which runs the
//! consistency check between the transition table and the state configs.

use super::state::{CallState, Trigger};
use super::transition::{standard_table, TransitionTable};
use std::collections::HashMap;
use thiserror::Error;

/// Default turn budget for a state
pub const DEFAULT_MAX_TURNS: u32 = 5;

/// Configuration for a single call state
#[derive(Debug, Clone, PartialEq)]
pub struct StateConfig {
    pub description: String,
    pub objective: String,
    /// Tags used to filter knowledge retrieval for this state
    pub knowledge_categories: Vec<String>,
    pub allowed_triggers: Vec<Trigger>,
    /// Agent turns allowed before the timeout trigger fires
    pub max_turns: u32,
    pub guidelines: Vec<String>,
    /// Trigger applied automatically once `max_turns` is reached
    pub timeout_trigger: Option<Trigger>,
}

impl StateConfig {
    pub fn new(description: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            objective: objective.into(),
            knowledge_categories: Vec::new(),
            allowed_triggers: Vec::new(),
            max_turns: DEFAULT_MAX_TURNS,
            guidelines: Vec::new(),
            timeout_trigger: None,
        }
    }

    pub fn with_categories(mut self, categories: &[&str]) -> Self {
        self.knowledge_categories = categories.iter().map(|c| (*c).to_string()).collect();
        self
    }

    pub fn with_triggers(mut self, triggers: &[Trigger]) -> Self {
        self.allowed_triggers = triggers.to_vec();
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_guidelines(mut self, guidelines: &[&str]) -> Self {
        self.guidelines = guidelines.iter().map(|g| (*g).to_string()).collect();
        self
    }

    pub fn with_timeout(mut self, trigger: Trigger) -> Self {
        self.timeout_trigger = Some(trigger);
        self
    }

    pub fn allows(&self, trigger: Trigger) -> bool {
        self.allowed_triggers.contains(&trigger)
    }
}

/// Mismatch between the transition table and the state configs.
///
/// Always a programming or configuration defect; the process must not serve
/// calls when one is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("state {0} has no configuration")]
    MissingConfig(CallState),
    #[error("state {0} has a zero turn budget")]
    ZeroTurnBudget(CallState),
    #[error("config for {state} allows {trigger} but the transition table has no entry for ({state}, {trigger})")]
    MissingTransition { state: CallState, trigger: Trigger },
    #[error("transition table has entry ({state}, {trigger}) but {trigger} is not in the allowed triggers of {state}")]
    UnlistedTransition { state: CallState, trigger: Trigger },
    #[error("config for {state} has timeout trigger {trigger} which is not in its allowed triggers")]
    TimeoutNotAllowed { state: CallState, trigger: Trigger },
    #[error("transition ({state}, {trigger}) targets the initial state")]
    TargetsInitialState { state: CallState, trigger: Trigger },
    #[error("terminal state has an outgoing transition on {0}")]
    TerminalHasTransition(Trigger),
}

/// Transition table plus per-state configuration, checked for consistency.
#[derive(Debug, Clone)]
pub struct CallFlow {
    table: TransitionTable,
    configs: HashMap<CallState, StateConfig>,
}

impl CallFlow {
    /// Build a call flow, rejecting any table/config mismatch.
    pub fn new(
        table: TransitionTable,
        configs: HashMap<CallState, StateConfig>,
    ) -> Result<Self, ConfigurationError> {
        validate_consistency(&table, &configs)?;
        Ok(Self { table, configs })
    }

    /// The standard outbound cold-call flow
    pub fn standard() -> Result<Self, ConfigurationError> {
        Self::new(standard_table(), standard_configs())
    }

    /// Configuration of `state`. Presence is guaranteed by validation.
    pub fn config(&self, state: CallState) -> &StateConfig {
        &self.configs[&state]
    }

    /// Destination of `(state, trigger)`, if the move is legal
    pub fn destination(&self, state: CallState, trigger: Trigger) -> Option<CallState> {
        self.table.get(&(state, trigger)).copied()
    }
}

fn validate_consistency(
    table: &TransitionTable,
    configs: &HashMap<CallState, StateConfig>,
) -> Result<(), ConfigurationError> {
    for state in CallState::ALL {
        let config = configs
            .get(&state)
            .ok_or(ConfigurationError::MissingConfig(state))?;

        if config.max_turns == 0 {
            return Err(ConfigurationError::ZeroTurnBudget(state));
        }

        for &trigger in &config.allowed_triggers {
            if !table.contains_key(&(state, trigger)) {
                return Err(ConfigurationError::MissingTransition { state, trigger });
            }
        }

        if let Some(trigger) = config.timeout_trigger {
            if !config.allows(trigger) {
                return Err(ConfigurationError::TimeoutNotAllowed { state, trigger });
            }
        }
    }

    for (&(state, trigger), &to) in table {
        let config = configs
            .get(&state)
            .ok_or(ConfigurationError::MissingConfig(state))?;
        if !config.allows(trigger) {
            return Err(ConfigurationError::UnlistedTransition { state, trigger });
        }
        if state.is_terminal() {
            return Err(ConfigurationError::TerminalHasTransition(trigger));
        }
        if to == CallState::INITIAL {
            return Err(ConfigurationError::TargetsInitialState { state, trigger });
        }
    }

    Ok(())
}

/// State configs for the standard call flow
pub fn standard_configs() -> HashMap<CallState, StateConfig> {
    use CallState as S;
    use Trigger as T;

    let mut c = HashMap::new();

    c.insert(
        S::Greeting,
        StateConfig::new(
            "Initial contact with the prospect",
            "Introduce yourself and the company, then confirm you are speaking to the right person.",
        )
        .with_categories(&["company_specific"])
        .with_triggers(&[T::CorrectPerson, T::WrongPerson, T::NotInterestedEarly, T::NoAnswer])
        .with_guidelines(&[
            "Keep it under 15 seconds",
            "Use the prospect's first name",
            "Do not pitch yet, only confirm identity",
            "If you reach a gatekeeper, ask to be connected",
        ])
        .with_timeout(T::NoAnswer),
    );

    c.insert(
        S::Rapport,
        StateConfig::new(
            "Build a brief connection before business talk",
            "Reference the personalization hook to show you did your homework, then move naturally to business.",
        )
        .with_categories(&["company_specific"])
        .with_triggers(&[T::RapportEstablished, T::NotInterestedEarly])
        .with_max_turns(3)
        .with_guidelines(&[
            "One or two exchanges at most, never force small talk",
            "Use the pre-call research hook",
            "Transition with: 'The reason I'm calling is...'",
        ])
        .with_timeout(T::RapportEstablished),
    );

    c.insert(
        S::Discovery,
        StateConfig::new(
            "Qualify the prospect by asking about their situation",
            "Understand pain, budget, authority and timeline. Decide whether they are a fit.",
        )
        .with_categories(&["qualifying_criteria"])
        .with_triggers(&[T::Qualified, T::Disqualified, T::ObjectionRaised])
        .with_guidelines(&[
            "Ask open-ended questions",
            "Let the prospect talk for most of the call",
            "Listen for pain signals to use in the pitch",
            "Gather information before pitching",
        ])
        .with_timeout(T::Qualified),
    );

    c.insert(
        S::Pitch,
        StateConfig::new(
            "Present the value proposition tailored to the discovered pain",
            "Connect their specific pain to the product. Use case studies where relevant.",
        )
        .with_categories(&["product_knowledge", "case_studies", "competitor_intelligence"])
        .with_triggers(&[T::ObjectionRaised, T::BuyingSignal])
        .with_guidelines(&[
            "Lead with their pain, not product features",
            "Quote specific numbers from case studies",
            "Stay concise, no monologues",
            "Ask a check-in question after key claims",
        ])
        .with_timeout(T::BuyingSignal),
    );

    c.insert(
        S::Objection,
        StateConfig::new(
            "Handle prospect pushback or concerns",
            "Acknowledge the concern, address it with evidence and guide back to value.",
        )
        .with_categories(&["objection_handling", "case_studies", "competitor_intelligence"])
        .with_triggers(&[T::ObjectionResolved, T::BuyingSignal, T::ObjectionUnresolved])
        .with_guidelines(&[
            "Never argue, acknowledge first",
            "Use the feel-felt-found pattern when it fits",
            "Back claims with data from the knowledge base",
            "If the objection persists after two attempts, move on gracefully",
        ])
        .with_timeout(T::ObjectionUnresolved),
    );

    c.insert(
        S::Close,
        StateConfig::new(
            "Ask for commitment to a next step",
            "Propose a specific next step at a specific time and make it easy to say yes.",
        )
        .with_categories(&["product_knowledge"])
        .with_triggers(&[T::CommitmentYes, T::CommitmentNo, T::ObjectionRaised])
        .with_guidelines(&[
            "Offer a concrete slot, e.g. 'How about Thursday at 2pm?'",
            "Keep the ask small: a 15-minute demo",
            "If they hesitate, offer to send information first",
        ])
        .with_timeout(T::CommitmentNo),
    );

    c.insert(
        S::WrapUp,
        StateConfig::new(
            "End the call gracefully",
            "Confirm next steps, thank the prospect and leave a positive impression.",
        )
        .with_categories(&["compliance_rules"])
        .with_triggers(&[T::WrapUpComplete])
        .with_guidelines(&[
            "Summarize what was agreed",
            "Confirm the email address for follow-up",
            "Thank them for their time",
            "End positively, even on a rejection",
        ]),
    );

    c.insert(
        S::Voicemail,
        StateConfig::new(
            "Leave a voicemail message",
            "Leave a short, compelling voicemail that gives a reason to call back.",
        )
        .with_categories(&["company_specific", "product_knowledge"])
        .with_triggers(&[T::WrapUpComplete])
        .with_max_turns(1)
        .with_guidelines(&[
            "Under 30 seconds",
            "Name, company, one hook, callback number",
            "Do not pitch the full product",
        ]),
    );

    c.insert(
        S::End,
        StateConfig::new("Call is complete", "None, terminal state"),
    );

    c
}
