//! Per-turn call orchestration
//!
//! Owns the pipeline for one prospect utterance: record, ground, generate,
//! validate the classifier label, count the turn, recover a stuck state and
//! record the reply. The caller holds the session lock for the whole call.

use super::recovery::check_stuck;
use super::reply::{AgentReply, GenerationFault};
use super::session::{CallSession, Role};
use super::traits::LlmClient;
use super::RuntimeError;

use crate::knowledge::KnowledgeFusion;
use crate::llm::{LlmError, LlmMessage, LlmRequest, SystemContent};
use crate::state_machine::{CallState, Trigger, TriggerLabel};
use crate::system_prompt::{
    build_messages, build_system_prompt, format_knowledge, NO_KNOWLEDGE, OPENING_INSTRUCTION,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Reply for any turn submitted after the call ended
pub const CALL_ENDED: &str = "[Call has ended]";

const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.7;

/// Counters for faults that are absorbed instead of surfaced
#[derive(Debug, Default)]
pub struct Diagnostics {
    unrecognized_triggers: AtomicU64,
    rejected_triggers: AtomicU64,
    malformed_outputs: AtomicU64,
    unavailable: AtomicU64,
    forced_transitions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub unrecognized_triggers: u64,
    pub rejected_triggers: u64,
    pub malformed_outputs: u64,
    pub unavailable: u64,
    pub forced_transitions: u64,
}

impl Diagnostics {
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            unrecognized_triggers: self.unrecognized_triggers.load(Ordering::Relaxed),
            rejected_triggers: self.rejected_triggers.load(Ordering::Relaxed),
            malformed_outputs: self.malformed_outputs.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            forced_transitions: self.forced_transitions.load(Ordering::Relaxed),
        }
    }

    fn count_fault(&self, fault: &GenerationFault) {
        let counter = match fault {
            GenerationFault::UnrecognizedTrigger(_) => &self.unrecognized_triggers,
            GenerationFault::MalformedOutput(_) => &self.malformed_outputs,
            GenerationFault::Unavailable(_) => &self.unavailable,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// What happened inside one turn, for logs and API consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TurnTrace {
    /// Classifier label as returned by the backend
    pub label: String,
    pub applied_trigger: Option<Trigger>,
    /// Recognized trigger that was not legal in the current state
    pub rejected_trigger: Option<Trigger>,
    pub timeout_trigger: Option<Trigger>,
    pub fallback_trigger: Option<Trigger>,
    pub fault: Option<&'static str>,
    pub knowledge_ids: Vec<String>,
    pub internal_reasoning: String,
}

/// Result of one orchestrator call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReply {
    pub reply: String,
    pub state: CallState,
    pub is_terminal: bool,
    pub trace: TurnTrace,
}

/// Drives calls through the state machine
pub struct CallOrchestrator<L: LlmClient> {
    llm: L,
    knowledge: KnowledgeFusion,
    generation_timeout: Duration,
    diagnostics: Arc<Diagnostics>,
}

impl<L: LlmClient> CallOrchestrator<L> {
    pub fn new(llm: L, knowledge: KnowledgeFusion, generation_timeout: Duration) -> Self {
        Self {
            llm,
            knowledge,
            generation_timeout,
            diagnostics: Arc::new(Diagnostics::default()),
        }
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    pub fn knowledge(&self) -> &KnowledgeFusion {
        &self.knowledge
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    /// Generate the opening line.
    ///
    /// Applies no trigger and does not count toward the turn budget.
    pub async fn start_call(&self, session: &mut CallSession) -> Result<TurnReply, RuntimeError> {
        if session.is_opened() {
            return Err(RuntimeError::AlreadyStarted(session.id().to_string()));
        }

        let machine = session.machine();
        let system = build_system_prompt(
            session.context(),
            machine.current_state(),
            machine.config(),
            machine.valid_triggers(),
            NO_KNOWLEDGE,
        );
        let messages = vec![LlmMessage::user(OPENING_INSTRUCTION)];

        let (reply, fault) = self.generate(system, messages).await;
        let mut trace = TurnTrace {
            label: reply.label.to_string(),
            internal_reasoning: reply.internal_reasoning.clone(),
            ..TurnTrace::default()
        };
        if let Some(fault) = fault {
            self.absorb_fault(session.id(), &fault);
            trace.fault = Some(fault.kind());
        }

        session.record(Role::Agent, reply.response.clone());
        session.mark_opened();

        tracing::info!(
            session_id = %session.id(),
            state = %session.current_state(),
            "Call started"
        );

        Ok(TurnReply {
            reply: reply.response,
            state: session.current_state(),
            is_terminal: session.is_terminal(),
            trace,
        })
    }

    /// Process one prospect utterance and return the agent's reply.
    ///
    /// Never fails: generation faults are absorbed into a fallback reply and
    /// a terminal call returns [`CALL_ENDED`] without touching the session.
    pub async fn process_turn(&self, session: &mut CallSession, message: &str) -> TurnReply {
        if session.is_terminal() {
            return TurnReply {
                reply: CALL_ENDED.to_string(),
                state: session.current_state(),
                is_terminal: true,
                trace: TurnTrace::default(),
            };
        }

        let start = std::time::Instant::now();
        let state_before = session.current_state();
        session.record(Role::Prospect, message);

        // Ground
        let categories = session.machine().config().knowledge_categories.clone();
        let entries = self.knowledge.fuse(message, &categories);
        let knowledge_text = format_knowledge(&entries);

        // Generate
        let machine = session.machine();
        let system = build_system_prompt(
            session.context(),
            state_before,
            machine.config(),
            machine.valid_triggers(),
            &knowledge_text,
        );
        let messages = build_messages(session.turns());
        let (reply, fault) = self.generate(system, messages).await;

        let mut trace = TurnTrace {
            label: reply.label.to_string(),
            knowledge_ids: entries.into_iter().map(|e| e.id).collect(),
            internal_reasoning: reply.internal_reasoning.clone(),
            ..TurnTrace::default()
        };
        if let Some(fault) = fault {
            self.absorb_fault(session.id(), &fault);
            trace.fault = Some(fault.kind());
        }

        // Validate and apply the classifier label
        match &reply.label {
            TriggerLabel::NoTransition => {}
            TriggerLabel::Unrecognized(raw) => {
                let fault = GenerationFault::UnrecognizedTrigger(raw.clone());
                self.absorb_fault(session.id(), &fault);
                trace.fault = Some(fault.kind());
            }
            TriggerLabel::Trigger(trigger) if !session.machine().can_transition(*trigger) => {
                tracing::info!(
                    session_id = %session.id(),
                    state = %state_before,
                    trigger = %trigger,
                    "Trigger not valid in current state, ignored"
                );
                self.diagnostics
                    .rejected_triggers
                    .fetch_add(1, Ordering::Relaxed);
                trace.rejected_trigger = Some(*trigger);
            }
            TriggerLabel::Trigger(trigger) => match session.machine_mut().transition(*trigger) {
                Ok(to) => {
                    tracing::info!(
                        session_id = %session.id(),
                        from = %state_before,
                        trigger = %trigger,
                        to = %to,
                        "State transition"
                    );
                    trace.applied_trigger = Some(*trigger);
                }
                // can_transition held above
                Err(e) => {
                    tracing::error!(session_id = %session.id(), error = %e, "Checked transition failed");
                }
            },
        }

        // Count the turn, then recover a stuck state
        let before_tick = session.current_state();
        let timed_out = session.machine_mut().record_turn();
        if let Some(to) = timed_out {
            trace.timeout_trigger = session.machine().history().last().map(|r| r.trigger);
            self.diagnostics
                .forced_transitions
                .fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                session_id = %session.id(),
                from = %before_tick,
                to = %to,
                "Turn budget exhausted, timeout transition applied"
            );
        }

        let decision = check_stuck(session.machine(), timed_out.is_some());
        if let Some(fallback) = decision.trigger {
            match session.machine_mut().transition(fallback) {
                Ok(to) => {
                    tracing::info!(
                        session_id = %session.id(),
                        trigger = %fallback,
                        to = %to,
                        "Stuck state, fallback transition applied"
                    );
                    self.diagnostics
                        .forced_transitions
                        .fetch_add(1, Ordering::Relaxed);
                    trace.fallback_trigger = Some(fallback);
                }
                Err(e) => tracing::error!(session_id = %session.id(), error = %e, "Checked fallback failed"),
            }
        }

        session.record(Role::Agent, reply.response.clone());

        tracing::debug!(
            session_id = %session.id(),
            state = %session.current_state(),
            duration_ms = %start.elapsed().as_millis(),
            "Turn processed"
        );

        TurnReply {
            reply: reply.response,
            state: session.current_state(),
            is_terminal: session.is_terminal(),
            trace,
        }
    }

    /// One bounded generation call. Faults come back alongside a usable reply.
    async fn generate(
        &self,
        system: Vec<SystemContent>,
        messages: Vec<LlmMessage>,
    ) -> (AgentReply, Option<GenerationFault>) {
        let request = LlmRequest::new(system, messages)
            .with_max_tokens(MAX_TOKENS)
            .with_temperature(TEMPERATURE)
            .json();

        let result =
            match tokio::time::timeout(self.generation_timeout, self.llm.complete(&request)).await
            {
                Ok(result) => result,
                Err(_) => Err(LlmError::timeout(format!(
                    "Generation exceeded {}ms",
                    self.generation_timeout.as_millis()
                ))),
            };

        match result {
            Ok(response) => {
                let raw = response.text();
                match AgentReply::parse(&raw) {
                    Ok(reply) => (reply, None),
                    Err(fault) => (AgentReply::from_malformed(&raw), Some(fault)),
                }
            }
            Err(e) => (AgentReply::unavailable(&e), Some(GenerationFault::Unavailable(e))),
        }
    }

    fn absorb_fault(&self, session_id: &str, fault: &GenerationFault) {
        self.diagnostics.count_fault(fault);
        tracing::warn!(
            session_id = %session_id,
            model = %self.llm.model_id(),
            kind = fault.kind(),
            error = %fault,
            "Generation fault absorbed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::test_fixtures::sample_base;
    use crate::runtime::reply::{REPEAT_REPLY, UNAVAILABLE_REPLY};
    use crate::runtime::session::CallContext;
    use crate::runtime::testing::{
        fusion_over, json_reply, text_response, MockLlmClient, SlowLlmClient,
    };
    use crate::state_machine::config::standard_configs;
    use crate::state_machine::transition::standard_table;
    use crate::state_machine::{CallFlow, Outcome};

    fn standard_flow() -> Arc<CallFlow> {
        Arc::new(CallFlow::standard().unwrap())
    }

    fn orchestrator(llm: Arc<MockLlmClient>) -> CallOrchestrator<Arc<MockLlmClient>> {
        CallOrchestrator::new(llm, fusion_over(sample_base()), Duration::from_secs(5))
    }

    fn session(flow: Arc<CallFlow>) -> CallSession {
        CallSession::new("test-session", CallContext::default(), flow)
    }

    #[tokio::test]
    async fn test_start_call_records_opening_without_counting() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_response(json_reply("NONE", "Hi, this is Sarah from SalesPilot. Is this James?"));
        let orch = orchestrator(llm.clone());
        let mut s = session(standard_flow());

        let reply = orch.start_call(&mut s).await.unwrap();
        assert_eq!(reply.reply, "Hi, this is Sarah from SalesPilot. Is this James?");
        assert_eq!(reply.state, CallState::Greeting);
        assert_eq!(s.turns().len(), 1);
        assert_eq!(s.machine().turns_in_state(), 0);

        let requests = llm.recorded_requests();
        assert_eq!(requests[0].messages[0].text(), OPENING_INSTRUCTION);
        assert!(requests[0].json_mode);
        assert_eq!(requests[0].max_tokens, Some(300));

        let again = orch.start_call(&mut s).await;
        assert!(matches!(again, Err(RuntimeError::AlreadyStarted(_))));
    }

    #[tokio::test]
    async fn test_opening_trigger_is_ignored() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_response(json_reply("CORRECT_PERSON", "Hello!"));
        let orch = orchestrator(llm);
        let mut s = session(standard_flow());

        orch.start_call(&mut s).await.unwrap();
        assert_eq!(s.current_state(), CallState::Greeting);
        assert!(s.machine().history().is_empty());
    }

    /// Happy path ending in a booked meeting
    #[tokio::test]
    async fn test_scenario_meeting_booked() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        for (trigger, text) in [
            ("CORRECT_PERSON", "Great, how are you?"),
            ("RAPPORT_ESTABLISHED", "Can I share why I called?"),
            ("QUALIFIED", "Sounds like a fit."),
            ("BUYING_SIGNAL", "Here's how it works."),
            ("COMMITMENT_YES", "Thursday at 2pm it is."),
            ("WRAP_UP_COMPLETE", "Thanks James, talk soon."),
        ] {
            llm.queue_response(json_reply(trigger, text));
        }
        let orch = orchestrator(llm);
        let mut s = session(standard_flow());

        let mut last = None;
        for msg in ["Yes, speaking", "Sure", "We have 5 reps", "How does it work?", "Thursday works", "Bye"] {
            last = Some(orch.process_turn(&mut s, msg).await);
        }
        let last = last.unwrap();
        assert!(last.is_terminal);
        assert_eq!(last.state, CallState::End);

        let summary = s.summary();
        assert_eq!(summary.outcome, Outcome::MeetingBooked);
        assert_eq!(summary.total_turns, 12);
        assert_eq!(
            summary.states_visited,
            vec![
                CallState::Greeting,
                CallState::Rapport,
                CallState::Discovery,
                CallState::Pitch,
                CallState::Close,
                CallState::WrapUp,
            ]
        );
    }

    /// Turn budget forces GREETING into VOICEMAIL
    #[tokio::test]
    async fn test_scenario_greeting_times_out() {
        let mut configs = standard_configs();
        configs.get_mut(&CallState::Greeting).unwrap().max_turns = 3;
        let flow = Arc::new(CallFlow::new(standard_table(), configs).unwrap());

        let llm = Arc::new(MockLlmClient::new("mock"));
        for _ in 0..3 {
            llm.queue_response(json_reply("NONE", "Hello? Anyone there?"));
        }
        let orch = orchestrator(llm);
        let mut s = session(flow);

        let first = orch.process_turn(&mut s, "...").await;
        assert_eq!(first.state, CallState::Greeting);
        orch.process_turn(&mut s, "...").await;
        let third = orch.process_turn(&mut s, "...").await;

        assert_eq!(third.state, CallState::Voicemail);
        assert_eq!(third.trace.timeout_trigger, Some(Trigger::NoAnswer));
        assert_eq!(third.trace.fallback_trigger, None);
        assert_eq!(s.machine().history().len(), 1);
        assert_eq!(s.summary().outcome, Outcome::VoicemailLeft);
        assert_eq!(orch.diagnostics().snapshot().forced_transitions, 1);
    }

    /// Illegal trigger is rejected and nothing moves
    #[tokio::test]
    async fn test_scenario_illegal_trigger_rejected() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_response(json_reply("CORRECT_PERSON", "Great!"));
        llm.queue_response(json_reply("COMMITMENT_YES", "Wonderful."));
        let orch = orchestrator(llm);
        let mut s = session(standard_flow());

        orch.process_turn(&mut s, "Yes this is James").await;
        let reply = orch.process_turn(&mut s, "Sure, go on").await;

        assert_eq!(reply.state, CallState::Rapport);
        assert_eq!(reply.reply, "Wonderful.");
        assert_eq!(reply.trace.rejected_trigger, Some(Trigger::CommitmentYes));
        assert_eq!(s.machine().history().len(), 1);
        assert_eq!(s.machine().turns_in_state(), 2);
        assert_eq!(orch.diagnostics().snapshot().rejected_triggers, 1);
    }

    /// Writer that collects formatted log lines for assertions
    #[derive(Clone, Default)]
    struct LogCapture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogCapture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn test_illegal_trigger_is_checked_before_transition() {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_response(json_reply("COMMITMENT_YES", "Great, see you Thursday."));
        let orch = orchestrator(llm);
        let mut s = session(standard_flow());

        let reply = orch.process_turn(&mut s, "Hello?").await;
        assert_eq!(reply.state, CallState::Greeting);
        assert_eq!(reply.trace.rejected_trigger, Some(Trigger::CommitmentYes));
        assert!(s.machine().history().is_empty());

        let logs = capture.text();
        assert!(logs.contains("Trigger not valid in current state, ignored"));
        assert!(!logs.contains("Invalid transition"));
        assert!(!logs.contains("Checked transition failed"));
    }

    /// Terminal session returns the sentinel and is not mutated
    #[tokio::test]
    async fn test_scenario_terminal_session_is_frozen() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_response(json_reply("WRONG_PERSON", "Sorry to bother you."));
        llm.queue_response(json_reply("WRAP_UP_COMPLETE", "Have a good day."));
        let orch = orchestrator(llm.clone());
        let mut s = session(standard_flow());

        orch.process_turn(&mut s, "Wrong number").await;
        orch.process_turn(&mut s, "Bye").await;
        assert!(s.is_terminal());
        let turns_before = s.turns().len();
        let requests_before = llm.recorded_requests().len();

        let reply = orch.process_turn(&mut s, "Hello?").await;
        assert_eq!(reply.reply, CALL_ENDED);
        assert!(reply.is_terminal);
        assert_eq!(s.turns().len(), turns_before);
        assert_eq!(llm.recorded_requests().len(), requests_before);
    }

    #[tokio::test]
    async fn test_unrecognized_label_is_absorbed() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_response(json_reply("MAYBE_LATER", "Sure thing."));
        let orch = orchestrator(llm);
        let mut s = session(standard_flow());

        let reply = orch.process_turn(&mut s, "Call me later").await;
        assert_eq!(reply.reply, "Sure thing.");
        assert_eq!(reply.state, CallState::Greeting);
        assert_eq!(reply.trace.label, "MAYBE_LATER");
        assert_eq!(reply.trace.applied_trigger, None);
        assert_eq!(reply.trace.fault, Some("unrecognized_trigger"));
        assert!(s.machine().history().is_empty());
        assert_eq!(s.machine().turns_in_state(), 1);
        assert_eq!(orch.diagnostics().snapshot().unrecognized_triggers, 1);
    }

    #[tokio::test]
    async fn test_malformed_output_is_spoken_as_text() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_response(text_response("Hi James, how are you?"));
        llm.queue_response(text_response(""));
        let orch = orchestrator(llm);
        let mut s = session(standard_flow());

        let reply = orch.process_turn(&mut s, "Hello").await;
        assert_eq!(reply.reply, "Hi James, how are you?");
        assert_eq!(reply.state, CallState::Greeting);
        assert_eq!(reply.trace.fault, Some("malformed_output"));

        let reply = orch.process_turn(&mut s, "Hello?").await;
        assert_eq!(reply.reply, REPEAT_REPLY);
        assert_eq!(orch.diagnostics().snapshot().malformed_outputs, 2);
    }

    #[tokio::test]
    async fn test_unavailable_backend_keeps_call_alive() {
        // Nothing queued: the mock reports a network error
        let llm = Arc::new(MockLlmClient::new("mock"));
        let orch = orchestrator(llm.clone());
        let mut s = session(standard_flow());

        let reply = orch.process_turn(&mut s, "Hello").await;
        assert_eq!(reply.reply, UNAVAILABLE_REPLY);
        assert_eq!(reply.state, CallState::Greeting);
        assert!(!reply.is_terminal);
        assert_eq!(s.turns().len(), 2);
        assert!(s.machine().history().is_empty());
        assert_eq!(orch.diagnostics().snapshot().unavailable, 1);

        // Backend recovers and the call carries on
        llm.queue_response(json_reply("CORRECT_PERSON", "Great, thanks for taking my call."));
        let next = orch.process_turn(&mut s, "Yes, this is James").await;
        assert_eq!(next.reply, "Great, thanks for taking my call.");
        assert_eq!(next.state, CallState::Rapport);
        assert_eq!(next.trace.fault, None);
        assert_eq!(s.turns().len(), 4);
        assert_eq!(s.machine().history().len(), 1);
        assert_eq!(orch.diagnostics().snapshot().unavailable, 1);
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let llm = SlowLlmClient::new(Duration::from_secs(30));
        let orch = CallOrchestrator::new(
            llm,
            fusion_over(sample_base()),
            Duration::from_millis(20),
        );
        let mut s = session(standard_flow());

        let reply = orch.process_turn(&mut s, "Hello").await;
        assert_eq!(reply.reply, UNAVAILABLE_REPLY);
        assert_eq!(reply.trace.fault, Some("unavailable"));
    }

    #[tokio::test]
    async fn test_stuck_state_fallback_applies_once() {
        let mut configs = standard_configs();
        let rapport = configs.get_mut(&CallState::Rapport).unwrap();
        rapport.max_turns = 2;
        rapport.timeout_trigger = None;
        let flow = Arc::new(CallFlow::new(standard_table(), configs).unwrap());

        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_response(json_reply("CORRECT_PERSON", "Great!"));
        llm.queue_response(json_reply("NONE", "I noticed you're hiring."));
        let orch = orchestrator(llm);
        let mut s = session(flow);

        let first = orch.process_turn(&mut s, "Yes, James here").await;
        assert_eq!(first.state, CallState::Rapport);
        let reply = orch.process_turn(&mut s, "We are").await;

        assert_eq!(reply.state, CallState::Discovery);
        assert_eq!(reply.trace.fallback_trigger, Some(Trigger::RapportEstablished));
        assert_eq!(s.machine().history().len(), 2);
    }

    #[tokio::test]
    async fn test_turn_prompt_carries_state_and_knowledge() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_response(json_reply("CORRECT_PERSON", "Great!"));
        llm.queue_response(json_reply("RAPPORT_ESTABLISHED", "Can I share?"));
        llm.queue_response(json_reply("OBJECTION_RAISED", "I hear you."));
        llm.queue_response(json_reply("NONE", "Fair point."));
        let orch = orchestrator(llm.clone());
        let mut s = session(standard_flow());

        orch.process_turn(&mut s, "Yes").await;
        orch.process_turn(&mut s, "Sure").await;
        orch.process_turn(&mut s, "We already use a competitor").await;
        let reply = orch
            .process_turn(&mut s, "Honestly it's too expensive")
            .await;

        assert_eq!(reply.state, CallState::Objection);
        assert_eq!(reply.trace.knowledge_ids, vec!["comp-001", "obj-001"]);

        let request = llm.recorded_requests().pop().unwrap();
        let system = request.system_text();
        assert!(system.contains("## Current State: OBJECTION"));
        assert!(system.contains("Acknowledge budget concerns"));
        assert!(!system.contains("[compliance_rules/"));
        // Log so far: 7 turns, the latest prospect message last
        assert_eq!(request.messages.len(), 7);
        assert_eq!(request.messages[6].text(), "Honestly it's too expensive");
    }
}
