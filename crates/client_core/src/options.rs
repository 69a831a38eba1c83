use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CounterAction;

/// When the controller re-reads `getCount()` after a confirmed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountRefresh {
    #[default]
    AfterEveryAction,
    /// Increment leaves the displayed count untouched; decrement and reset re-read.
    SkipAfterIncrement,
}

impl CountRefresh {
    pub fn should_refresh(self, action: CounterAction) -> bool {
        match self {
            CountRefresh::AfterEveryAction => true,
            CountRefresh::SkipAfterIncrement => action != CounterAction::Increment,
        }
    }
}

impl FromStr for CountRefresh {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "after_every_action" | "always" => Ok(CountRefresh::AfterEveryAction),
            "skip_after_increment" => Ok(CountRefresh::SkipAfterIncrement),
            other => Err(format!("unknown count refresh policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    pub count_refresh: CountRefresh,
}
