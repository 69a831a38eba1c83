use std::fmt;

use serde::{Deserialize, Serialize};
use shared::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterAction {
    Increment,
    Decrement,
    Reset,
}

impl CounterAction {
    pub fn name(self) -> &'static str {
        match self {
            CounterAction::Increment => "increment",
            CounterAction::Decrement => "decrement",
            CounterAction::Reset => "reset",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            CounterAction::Increment => "Failed to increment",
            CounterAction::Decrement => "Transaction failed. Please try again.",
            CounterAction::Reset => "Reset failed. You may not be the contract owner.",
        }
    }
}

impl fmt::Display for CounterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no wallet provider detected")]
    ProviderUnavailable,
    #[error("wallet connection rejected: {0}")]
    ConnectionRejected(String),
    #[error("{action} transaction failed: {reason}")]
    TransactionFailed {
        action: CounterAction,
        reason: String,
    },
    #[error("contract read failed: {0}")]
    ReadFailed(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::ProviderUnavailable => ErrorKind::ProviderUnavailable,
            SessionError::ConnectionRejected(_) => ErrorKind::ConnectionRejected,
            SessionError::TransactionFailed { .. } => ErrorKind::TransactionFailed,
            SessionError::ReadFailed(_) => ErrorKind::ReadFailed,
        }
    }

    /// Short line shown in the session's error area.
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::ProviderUnavailable => {
                "No wallet provider detected. Install a wallet and try again."
            }
            SessionError::ConnectionRejected(_) => "Failed to connect wallet. Please try again.",
            SessionError::TransactionFailed { action, .. } => action.failure_message(),
            SessionError::ReadFailed(_) => "Failed to read count.",
        }
    }
}
