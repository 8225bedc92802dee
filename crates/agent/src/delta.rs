//! Incremental text from successive full-text snapshots.

use crate::stream_event::{AgentEvent, StreamFrame};

/// Turns a sequence of cumulative snapshots into text deltas.
///
/// When a snapshot extends what was already emitted only the new suffix is
/// returned. When it does not (the model replaced its earlier text, e.g. a
/// new reasoning phase after tool use) the whole snapshot is returned as-is.
#[derive(Debug, Default)]
pub struct DeltaReconstructor {
    emitted_so_far: String,
}

impl DeltaReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one loop event; returns the delta to emit, if any.
    pub fn observe(&mut self, event: &AgentEvent) -> Option<String> {
        let text = event.latest_assistant_text()?;
        self.push_text(text)
    }

    /// Feed one snapshot text; returns the delta to emit, if any.
    pub fn push_text(&mut self, text: &str) -> Option<String> {
        let delta = match text.strip_prefix(self.emitted_so_far.as_str()) {
            Some(suffix) => suffix.to_string(),
            None => text.to_string(),
        };
        self.emitted_so_far.clear();
        self.emitted_so_far.push_str(text);

        (!delta.is_empty()).then_some(delta)
    }

    pub fn emitted_so_far(&self) -> &str {
        &self.emitted_so_far
    }

    /// The terminal marker, carrying the full final text.
    pub fn finish(self, full: impl Into<String>) -> StreamFrame {
        StreamFrame::Done { full: full.into() }
    }
}
