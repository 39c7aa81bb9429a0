//! Interactive text harness: one call, prospect lines read from a stream
//!
//! Commands: `quit` ends the session, `state` shows the current state and
//! its triggers, `summary` prints the running summary as JSON.

use crate::runtime::{
    CallContext, CallRuntime, CallSummary, LlmClient, RuntimeError, SummaryStore,
};
use crate::state_machine::CallState;
use std::io::Write;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const SESSION_ID: &str = "console";
const RULE: &str = "============================================================";

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("Failed to encode summary: {0}")]
    Encode(#[from] serde_json::Error),
}

enum Command<'a> {
    Quit,
    State,
    Summary,
    Say(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(match line.to_lowercase().as_str() {
            "quit" => Command::Quit,
            "state" => Command::State,
            "summary" => Command::Summary,
            _ => Command::Say(line),
        })
    }
}

/// Run one call to completion or until `quit` / end of input.
///
/// Returns the final summary. The session is removed from the runtime.
pub async fn run<L, S, R, W>(
    runtime: &CallRuntime<L, S>,
    context: CallContext,
    input: R,
    out: &mut W,
) -> Result<CallSummary, ConsoleError>
where
    L: LlmClient,
    S: SummaryStore,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "{RULE}")?;
    writeln!(out, "COLD CALLER AGENT - Text Test Mode")?;
    writeln!(out, "{RULE}")?;
    writeln!(
        out,
        "Calling: {} ({} at {})",
        context.prospect_name, context.prospect_title, context.prospect_company
    )?;
    writeln!(out, "State: {}", CallState::INITIAL)?;

    let (id, opening) = runtime.start(Some(SESSION_ID.to_string()), context).await?;
    writeln!(out, "\nAgent: {}", opening.reply)?;
    writeln!(out, "  [State: {}]", opening.state)?;

    let mut is_over = opening.is_terminal;
    let mut lines = input.lines();

    while !is_over {
        write!(out, "\nProspect: ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match Command::parse(&line) {
            None => continue,
            Some(Command::Quit) => break,
            Some(Command::State) => {
                let Some(handle) = runtime.registry().get(&id).await else {
                    return Err(RuntimeError::SessionNotFound(id).into());
                };
                let session = handle.lock().await;
                let triggers: Vec<&str> = session
                    .machine()
                    .valid_triggers()
                    .iter()
                    .map(|t| t.as_str())
                    .collect();
                writeln!(out, "  [Current state: {}]", session.current_state())?;
                writeln!(out, "  [Valid triggers: {}]", triggers.join(", "))?;
                writeln!(
                    out,
                    "  [Turns in state: {}/{}]",
                    session.machine().turns_in_state(),
                    session.machine().config().max_turns
                )?;
            }
            Some(Command::Summary) => {
                let summary = runtime.summary(&id).await?;
                writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
            }
            Some(Command::Say(message)) => {
                let reply = runtime.turn(&id, message).await?;
                writeln!(out, "\nAgent: {}", reply.reply)?;
                writeln!(out, "  [State: {}]", reply.state)?;
                is_over = reply.is_terminal;
            }
        }
    }

    let summary = runtime.end(&id).await?;
    let visited: Vec<&str> = summary.states_visited.iter().map(|s| s.as_str()).collect();

    writeln!(out, "\n{RULE}")?;
    writeln!(out, "CALL ENDED")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Outcome: {}", summary.outcome)?;
    writeln!(out, "Total turns: {}", summary.total_turns)?;
    writeln!(out, "States visited: {}", visited.join(" -> "))?;

    Ok(summary)
}
