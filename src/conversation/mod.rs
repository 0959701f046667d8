//! Conversation session state
//!
//! A session carries the active language mode and where the conversation is
//! in the resolution state machine. The engine never keeps per-conversation
//! state of its own, so several sessions can share one engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Ready for the next utterance
    AwaitingInput,

    /// The last utterance was unknown; the next input teaches a reply for `key`
    TeachPrompt { key: String },

    /// The user asked to leave; terminal
    Exit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub mode: String,
    pub state: SessionState,
}

impl Session {
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode: mode.into(),
            state: SessionState::AwaitingInput,
        }
    }

    pub fn awaiting_teaching(&self) -> bool {
        matches!(self.state, SessionState::TeachPrompt { .. })
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session() {
        let session = Session::new("en");
        assert_eq!(session.mode, "en");
        assert_eq!(session.state, SessionState::AwaitingInput);
        assert!(!session.awaiting_teaching());
        assert!(!session.is_finished());
    }

    #[test]
    fn test_state_serialization() {
        let state = SessionState::TeachPrompt {
            key: "hello".to_string(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "teach_prompt");
        assert_eq!(json["key"], "hello");
    }
}
