//! Session domain type: a directive-headed, bounded message history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::message::Message;

/// Default number of non-directive messages kept after a turn (10 exchanges).
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

const MAX_SESSION_ID_LEN: usize = 128;

/// Opaque identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Validate and wrap a caller-supplied id.
    ///
    /// Ids are taken verbatim: surrounding whitespace is rejected rather than
    /// trimmed, so `" a"` can never alias `"a"`.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SessionError::InvalidId("session id is empty".into()));
        }
        if trimmed.len() != raw.len() {
            return Err(SessionError::InvalidId(
                "session id has leading or trailing whitespace".into(),
            ));
        }
        if raw.len() > MAX_SESSION_ID_LEN {
            return Err(SessionError::InvalidId(format!(
                "session id longer than {MAX_SESSION_ID_LEN} bytes"
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(SessionError::InvalidId(
                "session id contains control characters".into(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-session conversational memory.
///
/// `history[0]` is always the system directive. Only whole turns
/// (user message + final assistant message) are ever appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    history: Vec<Message>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session whose history is exactly `[System(directive)]`.
    pub fn new(id: SessionId, directive: &str) -> Self {
        Self {
            id,
            history: vec![Message::system(directive)],
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append one completed turn, then apply retention.
    ///
    /// When the history exceeds `limit + 1` messages it becomes the directive
    /// followed by the most recent `limit` messages.
    pub fn append_turn(&mut self, user: Message, assistant: Message, limit: usize) {
        self.history.push(user);
        self.history.push(assistant);

        if self.history.len() > limit + 1 {
            let drop_until = self.history.len() - limit;
            self.history.drain(1..drop_until);
        }
    }

    /// Reset the history to just the directive.
    pub fn clear(&mut self) {
        self.history.truncate(1);
    }
}
