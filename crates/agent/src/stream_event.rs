//! Events flowing out of a turn.
//!
//! `AgentEvent` is what the dispatch loop pushes after every append to its
//! in-run history. `StreamFrame` is what a `stream_turn` caller receives:
//! text deltas followed by exactly one terminal frame.

use serde::ser::{Serialize, SerializeMap, Serializer};
use voxagent_core::message::Message;

/// A snapshot of the in-run history, taken right after an append.
#[derive(Debug, Clone)]
pub struct AgentEvent {
    /// Reasoning phase that produced this snapshot (1-based).
    pub iteration: u32,
    pub history: Vec<Message>,
}

impl AgentEvent {
    /// Text of the latest message, if that message is a non-empty assistant reply.
    pub fn latest_assistant_text(&self) -> Option<&str> {
        match self.history.last() {
            Some(Message::Assistant { content, .. }) if !content.is_empty() => Some(content.as_str()),
            _ => None,
        }
    }
}

/// One frame of an incremental response.
///
/// Serializes to the wire shapes `{"delta": ..}`, `{"done": true, "full": ..}`
/// and `{"error": ..}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Newly available text.
    Delta { delta: String },

    /// The turn finished; `full` is the complete final text.
    Done { full: String },

    /// The turn failed; nothing was committed to the session.
    Error { message: String },
}

impl StreamFrame {
    pub fn delta(delta: impl Into<String>) -> Self {
        Self::Delta {
            delta: delta.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Delta { .. })
    }
}

impl Serialize for StreamFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Delta { delta } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("delta", delta)?;
                map.end()
            }
            Self::Done { full } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("done", &true)?;
                map.serialize_entry("full", full)?;
                map.end()
            }
            Self::Error { message } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", message)?;
                map.end()
            }
        }
    }
}
