//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary trigger sequences.

use super::*;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn standard_flow() -> Arc<CallFlow> {
    Arc::new(CallFlow::standard().expect("standard flow is consistent"))
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_trigger() -> impl Strategy<Value = Trigger> {
    prop::sample::select(Trigger::ALL.to_vec())
}

/// A step is either a classifier trigger or a bare turn tick
#[derive(Debug, Clone)]
enum Step {
    Apply(Trigger),
    Tick,
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => arb_trigger().prop_map(Step::Apply),
        1 => Just(Step::Tick),
    ]
}

fn arb_label() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_trigger().prop_map(|t| t.as_str().to_string()),
        Just("NONE".to_string()),
        "[A-Z_]{0,24}",
        "[a-z ]{0,12}",
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Rejected transitions change nothing; accepted ones add exactly one record.
    #[test]
    fn history_grows_only_on_success(steps in prop::collection::vec(arb_step(), 0..60)) {
        let mut sm = StateMachine::new(standard_flow());

        for step in steps {
            let before_state = sm.current_state();
            let before_len = sm.history().len();
            let before_turns = sm.turns_in_state();

            match step {
                Step::Apply(trigger) => {
                    let legal = sm.can_transition(trigger);
                    match sm.transition(trigger) {
                        Ok(to) => {
                            prop_assert!(legal);
                            prop_assert_eq!(sm.history().len(), before_len + 1);
                            prop_assert_eq!(sm.current_state(), to);
                            prop_assert_eq!(sm.turns_in_state(), 0);
                            let last = sm.history().last().copied().unwrap();
                            prop_assert_eq!(last.from, before_state);
                            prop_assert_eq!(last.trigger, trigger);
                        }
                        Err(TransitionError::InvalidTransition { .. }) => {
                            prop_assert!(!legal);
                            prop_assert_eq!(sm.history().len(), before_len);
                            prop_assert_eq!(sm.current_state(), before_state);
                            prop_assert_eq!(sm.turns_in_state(), before_turns);
                        }
                    }
                }
                Step::Tick => {
                    let fired = sm.record_turn();
                    let expected_len = before_len + usize::from(fired.is_some());
                    prop_assert_eq!(sm.history().len(), expected_len);
                }
            }
        }
    }

    /// The initial state is never re-entered and END is final.
    #[test]
    fn initial_never_reentered_and_end_is_final(steps in prop::collection::vec(arb_step(), 0..60)) {
        let mut sm = StateMachine::new(standard_flow());
        let mut reached_end = false;

        for step in steps {
            match step {
                Step::Apply(trigger) => { let _ = sm.transition(trigger); }
                Step::Tick => { let _ = sm.record_turn(); }
            }
            if reached_end {
                prop_assert!(sm.is_terminal());
            }
            reached_end |= sm.is_terminal();
        }

        for record in sm.history() {
            prop_assert_ne!(record.to, CallState::INITIAL);
        }
    }

    /// Every history entry is a legal table move and the chain is contiguous.
    #[test]
    fn history_is_a_contiguous_legal_path(steps in prop::collection::vec(arb_step(), 0..60)) {
        let flow = standard_flow();
        let mut sm = StateMachine::new(flow.clone());
        for step in steps {
            match step {
                Step::Apply(trigger) => { let _ = sm.transition(trigger); }
                Step::Tick => { let _ = sm.record_turn(); }
            }
        }

        let mut expected_from = CallState::INITIAL;
        for record in sm.history() {
            prop_assert_eq!(record.from, expected_from);
            prop_assert_eq!(flow.destination(record.from, record.trigger), Some(record.to));
            expected_from = record.to;
        }
        prop_assert_eq!(sm.current_state(), expected_from);
    }

    /// Classifier labels always parse; known names round-trip.
    #[test]
    fn label_parse_is_total(raw in arb_label()) {
        match TriggerLabel::parse(&raw) {
            TriggerLabel::NoTransition => {
                let trimmed = raw.trim();
                prop_assert!(trimmed.is_empty() || trimmed == "NONE");
            }
            TriggerLabel::Trigger(t) => prop_assert_eq!(t.as_str(), raw.trim()),
            TriggerLabel::Unrecognized(s) => {
                prop_assert!(Trigger::from_name(&s).is_none());
                prop_assert_ne!(s.as_str(), "NONE");
            }
        }
    }

    /// Outcome only depends on which triggers appear, not on their order.
    #[test]
    fn outcome_ignores_order(steps in prop::collection::vec(arb_step(), 0..60)) {
        let mut sm = StateMachine::new(standard_flow());
        for step in steps {
            match step {
                Step::Apply(trigger) => { let _ = sm.transition(trigger); }
                Step::Tick => { let _ = sm.record_turn(); }
            }
        }
        let mut reversed = sm.history().to_vec();
        reversed.reverse();
        prop_assert_eq!(Outcome::classify(sm.history()), Outcome::classify(&reversed));

        if sm.history().iter().any(|r| r.trigger == Trigger::CommitmentYes) {
            prop_assert_eq!(Outcome::classify(sm.history()), Outcome::MeetingBooked);
        }
    }
}
