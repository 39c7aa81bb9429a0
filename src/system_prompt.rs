//! System prompt and message assembly for the generation backend
//!
//! Every call gets the base prompt (identity, tone, hard rules, prospect
//! context, output format, valid triggers) followed by the prompt for the
//! current state and the knowledge retrieved for this turn.

use crate::knowledge::RetrievedEntry;
use crate::llm::{LlmMessage, SystemContent};
use crate::runtime::session::{CallContext, ConversationTurn, Role};
use crate::state_machine::state::NO_TRANSITION;
use crate::state_machine::{CallState, StateConfig, Trigger};
use std::fmt::Write;

/// Synthetic prospect message used to generate the opening line
pub const OPENING_INSTRUCTION: &str =
    "[Call connected. Introduce yourself and confirm you're speaking to the right person.]";

/// Knowledge text when nothing applicable was retrieved
pub const NO_KNOWLEDGE: &str = "No specific knowledge retrieved for this turn.";

fn base_prompt(ctx: &CallContext, valid_triggers: &str) -> String {
    format!(
        r#"You are a sales development representative (SDR) making an outbound cold call.

## Identity
- Name: {agent_name}
- Company: {company_name}
- Product: {product_name}

## Personality & Tone
- Professional but conversational, not robotic and not overly casual
- Confident without being pushy
- Listen more than you talk. Aim for the prospect to speak most of the time.
- Keep responses SHORT, 2-3 sentences max per turn. This is a phone call, not an email.
- Ask one question at a time. Never stack multiple questions.
- Use the prospect's first name naturally, but don't overuse it.

## Hard Rules (NEVER violate)
- Never make guarantees about specific results. Use "on average", "typically", "our customers report".
- Never fabricate case studies, statistics, or customer names.
- If you don't know the answer, say "That's a great question, let me have our specialist follow up on that."
- If the prospect asks to be removed from the call list, immediately comply and end the call.
- Always identify yourself and your company at the start of the call.
- Never misrepresent the purpose of the call.

## Prospect Context
- Name: {prospect_name}
- Title: {prospect_title}
- Company: {prospect_company}
- Industry: {prospect_industry}
- Company size: {prospect_company_size}
- Personalization hook: {personalization_hook}
- Pain hypothesis: {pain_hypothesis}

## Output Format
You MUST respond with valid JSON and nothing else. No markdown, no backticks, no explanation outside the JSON.

{{
    "trigger": "<one of the valid triggers listed below, or NONE if no state transition should occur>",
    "response": "<what you say to the prospect, spoken words only, no stage directions>",
    "internal_reasoning": "<1 sentence: why you chose this trigger and response>"
}}

### Trigger Classification Rules
- Choose the trigger that best matches what the PROSPECT said or implied.
- Use "NONE" if the conversation should stay in the current state.
- Only choose triggers from the valid list for the current state.
- Be conservative with transitions. Don't rush to CLOSE before DISCOVERY is done.

Valid triggers for current state: {valid_triggers}"#,
        agent_name = ctx.agent_name,
        company_name = ctx.company_name,
        product_name = ctx.product_name,
        prospect_name = ctx.prospect_name,
        prospect_title = ctx.prospect_title,
        prospect_company = ctx.prospect_company,
        prospect_industry = ctx.prospect_industry,
        prospect_company_size = ctx.prospect_company_size,
        personalization_hook = ctx.personalization_hook,
        pain_hypothesis = ctx.pain_hypothesis,
        valid_triggers = valid_triggers,
    )
}

/// Comma-separated trigger list, always ending with `NONE`
fn trigger_list(valid_triggers: &[Trigger]) -> String {
    valid_triggers
        .iter()
        .map(|t| t.as_str())
        .chain(std::iter::once(NO_TRANSITION))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prompt for the current state. Empty for the terminal state.
fn state_prompt(state: CallState, config: &StateConfig, knowledge: &str) -> String {
    if state.is_terminal() {
        return String::new();
    }

    let mut prompt = format!(
        "## Current State: {state}\n{}\n\n### Your objective\n{}",
        config.description, config.objective
    );

    if !config.guidelines.is_empty() {
        prompt.push_str("\n\n### How to behave");
        for guideline in &config.guidelines {
            let _ = write!(prompt, "\n- {guideline}");
        }
    }

    let _ = write!(prompt, "\n\n### Knowledge to use\n{knowledge}");
    prompt
}

/// Render retrieved knowledge for the prompt.
///
/// Compliance entries are left out since the base prompt's hard rules
/// already cover them.
pub fn format_knowledge(entries: &[RetrievedEntry]) -> String {
    let sections: Vec<String> = entries
        .iter()
        .filter(|e| !e.is_compliance())
        .map(|e| format!("[{}/{}] {}", e.category, e.subcategory, e.content))
        .collect();

    if sections.is_empty() {
        NO_KNOWLEDGE.to_string()
    } else {
        sections.join("\n\n")
    }
}

/// Full system prompt for one generation call
pub fn build_system_prompt(
    ctx: &CallContext,
    state: CallState,
    config: &StateConfig,
    valid_triggers: &[Trigger],
    knowledge: &str,
) -> Vec<SystemContent> {
    let knowledge = if knowledge.trim().is_empty() {
        NO_KNOWLEDGE
    } else {
        knowledge
    };

    let mut system = vec![SystemContent::new(base_prompt(
        ctx,
        &trigger_list(valid_triggers),
    ))];
    let state_text = state_prompt(state, config, knowledge);
    if !state_text.is_empty() {
        system.push(SystemContent::new(state_text));
    }
    system
}

/// Convert the call log into chat messages.
///
/// Prior agent turns are re-wrapped in the JSON reply format so the model
/// keeps seeing a consistent pattern.
pub fn build_messages(turns: &[ConversationTurn]) -> Vec<LlmMessage> {
    turns
        .iter()
        .map(|turn| match turn.role {
            Role::Prospect => LlmMessage::user(turn.message.clone()),
            Role::Agent => LlmMessage::assistant(
                serde_json::json!({
                    "trigger": NO_TRANSITION,
                    "response": turn.message,
                    "internal_reasoning": "Previous turn.",
                })
                .to_string(),
            ),
        })
        .collect()
}
