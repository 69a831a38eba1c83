//! Commands typed into the interactive shell and their dispatch onto the
//! session controller.

use std::str::FromStr;

use client_core::{ActionOutcome, WalletSessionController};
use shared::session::Session;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    Connect,
    Increment,
    Decrement,
    Reset,
    Count,
    Owner,
    Status,
    Help,
    Quit,
}

pub const HELP: &str =
    "commands: connect | increment | decrement | reset | count | owner | status | help | quit";

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "connect" => Ok(ShellCommand::Connect),
            "increment" | "inc" | "+" => Ok(ShellCommand::Increment),
            "decrement" | "dec" | "-" => Ok(ShellCommand::Decrement),
            "reset" => Ok(ShellCommand::Reset),
            "count" => Ok(ShellCommand::Count),
            "owner" => Ok(ShellCommand::Owner),
            "status" => Ok(ShellCommand::Status),
            "help" | "?" => Ok(ShellCommand::Help),
            "quit" | "exit" => Ok(ShellCommand::Quit),
            other => Err(format!("unknown command '{other}'; {HELP}")),
        }
    }
}

/// Result of one dispatched command, ready for printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub outcome: Option<ActionOutcome>,
    pub note: Option<String>,
}

impl CommandReport {
    fn outcome(outcome: ActionOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            note: None,
        }
    }

    fn note(note: impl Into<String>) -> Self {
        Self {
            outcome: None,
            note: Some(note.into()),
        }
    }

    pub fn failed(&self) -> bool {
        matches!(self.outcome, Some(ActionOutcome::Failed(_)))
    }
}

pub async fn dispatch(controller: &WalletSessionController, command: ShellCommand) -> CommandReport {
    debug!("cli: dispatching command={command:?}");
    match command {
        ShellCommand::Connect => CommandReport::outcome(controller.connect().await),
        ShellCommand::Increment => CommandReport::outcome(controller.increment().await),
        ShellCommand::Decrement => CommandReport::outcome(controller.decrement().await),
        ShellCommand::Reset => CommandReport::outcome(controller.reset().await),
        ShellCommand::Count => CommandReport::outcome(controller.get_count().await),
        ShellCommand::Owner => match controller.contract_owner().await {
            Some(owner) => CommandReport::note(format!("owner: {owner}")),
            None if controller.snapshot().await.is_connected() => {
                CommandReport::outcome(ActionOutcome::Failed(shared::error::ErrorKind::ReadFailed))
            }
            None => CommandReport::note("owner: not connected"),
        },
        ShellCommand::Status => CommandReport {
            outcome: None,
            note: None,
        },
        ShellCommand::Help => CommandReport::note(HELP),
        ShellCommand::Quit => CommandReport::note("bye"),
    }
}

pub fn render_session(session: &Session, as_json: bool) -> String {
    if as_json {
        return serde_json::to_string(session).unwrap_or_else(|err| format!("{{\"error\":\"{err}\"}}"));
    }

    let status = serde_json::to_value(session.status)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", session.status));
    let mut line = format!("status={status} count={}", session.count);
    if let Some(account) = &session.account {
        line.push_str(&format!(" account={account}"));
    }
    if let Some(error) = &session.last_error {
        line.push_str(&format!("\nerror: {error}"));
    }
    line
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
