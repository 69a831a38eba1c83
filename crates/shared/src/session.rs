use serde::{Deserialize, Serialize};

use crate::{domain::Address, error::ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// A state-changing call or view call is in flight on the current binding.
    Acting,
}

impl SessionStatus {
    /// True while a contract binding is held for the session account.
    pub fn has_binding(self) -> bool {
        matches!(self, SessionStatus::Connected | SessionStatus::Acting)
    }

    pub fn is_busy(self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Acting)
    }
}

/// Render-side view of one wallet session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub status: SessionStatus,
    pub account: Option<Address>,
    pub count: u64,
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_kind: Option<ErrorKind>,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.status.has_binding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_is_disconnected_and_empty() {
        let session = Session::default();
        assert_eq!(session.status, SessionStatus::Disconnected);
        assert!(session.account.is_none());
        assert_eq!(session.count, 0);
        assert!(session.last_error.is_none());
        assert!(!session.is_connected());
    }

    #[test]
    fn serializes_status_in_snake_case() {
        let session = Session {
            status: SessionStatus::Connected,
            count: 7,
            ..Session::default()
        };
        let json = serde_json::to_value(&session).expect("serialize");
        assert_eq!(json["status"], "connected");
        assert_eq!(json["count"], 7);
        assert!(json.get("last_error_kind").is_none());
    }
}
