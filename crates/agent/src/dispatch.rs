//! The reason/act dispatch loop.
//!
//! A run starts in `Reasoning`, asks the model for the next assistant
//! message, then `Deciding` either moves to `Acting` (the message requested
//! tools) or to `Done`. `Acting` resolves every requested call and loops back
//! to `Reasoning`. The loop never touches the session store: it works on a
//! private copy of the history and hands back what it appended.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voxagent_core::error::{AgentError, ProviderError};
use voxagent_core::message::{Message, ToolCall};
use voxagent_core::provider::{Provider, ProviderRequest, ProviderResponse, SamplingOptions, Usage};
use voxagent_core::tool::ToolRegistry;

use crate::stream_event::AgentEvent;

/// Default cap on reasoning phases per turn.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Final text when the iteration guard trips.
pub const EXHAUSTED_TEXT: &str =
    "I'm sorry, I could not complete that request. Could you try rephrasing it?";

/// Final text when the model's terminal message is empty.
pub const EMPTY_RESPONSE_TEXT: &str =
    "I'm sorry, I couldn't come up with a response. Could you try asking again?";

/// Phases of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Reasoning,
    Deciding,
    Acting,
    Done,
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Non-empty text for the caller.
    pub final_text: String,

    /// Messages appended after the user message, in order.
    pub appended: Vec<Message>,

    /// Reasoning phases executed.
    pub iterations: u32,

    /// Tool calls resolved across all acting phases.
    pub tool_calls_made: usize,

    /// True when the iteration guard forced the run to end.
    pub exhausted: bool,

    /// Token usage summed over every model call that reported it.
    pub usage: Option<Usage>,
}

impl AgentOutcome {
    /// The assistant message committed to the session for this turn.
    pub fn final_message(&self) -> Message {
        Message::assistant(&self.final_text)
    }

    /// `AgentError::Exhausted` when the iteration guard ended the run.
    ///
    /// The run still succeeds with a fallback text; this lets callers that
    /// branch on [`AgentErrorKind`](voxagent_core::AgentErrorKind) see why.
    pub fn exhaustion(&self) -> Option<AgentError> {
        self.exhausted.then_some(AgentError::Exhausted {
            iterations: self.iterations,
        })
    }
}

/// Drives one turn against a provider and a tool registry.
pub struct DispatchLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    sampling: SamplingOptions,
    max_iterations: u32,
    model_timeout: Duration,
}

impl DispatchLoop {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            sampling: SamplingOptions::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingOptions) -> Self {
        self.sampling = sampling;
        self
    }

    /// Set the maximum number of reasoning phases (at least one).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run the loop over `history` plus `user`.
    ///
    /// Every append to the in-run history is published on `events` (when
    /// given). Tool failures become `ToolResult` text; model failures and
    /// cancellation end the run with an error.
    pub async fn run(
        &self,
        history: &[Message],
        user: Message,
        events: Option<&mpsc::Sender<AgentEvent>>,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome, AgentError> {
        let mut messages = Vec::with_capacity(history.len() + 4);
        messages.extend_from_slice(history);
        messages.push(user);
        let base_len = messages.len();

        let definitions = self.tools.definitions();
        let mut state = LoopState::Reasoning;
        let mut iterations = 0u32;
        let mut tool_calls_made = 0usize;
        let mut exhausted = false;
        let mut usage: Option<Usage> = None;

        while state != LoopState::Done {
            state = match state {
                LoopState::Reasoning => {
                    if cancel.is_cancelled() {
                        return Err(AgentError::Cancelled);
                    }
                    iterations += 1;
                    debug!(iteration = iterations, messages = messages.len(), "Reasoning");

                    let response = self.reason(&messages, &definitions, cancel).await?;
                    if let Some(u) = &response.usage {
                        usage = Some(add_usage(usage, u));
                    }
                    messages.push(response.into_message());
                    publish(events, iterations, &messages).await;
                    LoopState::Deciding
                }
                LoopState::Deciding => {
                    let wants_tools = messages.last().is_some_and(|m| !m.tool_calls().is_empty());
                    if !wants_tools {
                        LoopState::Done
                    } else if iterations >= self.max_iterations {
                        warn!(iterations, max = self.max_iterations, "Iteration guard tripped, ending run");
                        exhausted = true;
                        LoopState::Done
                    } else {
                        LoopState::Acting
                    }
                }
                LoopState::Acting => {
                    let calls = messages
                        .last()
                        .map(|m| m.tool_calls().to_vec())
                        .unwrap_or_default();
                    if cancel.is_cancelled() {
                        return Err(AgentError::Cancelled);
                    }

                    let results = self.act(&calls, cancel).await?;
                    tool_calls_made += calls.len();
                    for result in results {
                        messages.push(result);
                        publish(events, iterations, &messages).await;
                    }
                    LoopState::Reasoning
                }
                LoopState::Done => LoopState::Done,
            };
        }

        let final_text = if exhausted {
            EXHAUSTED_TEXT.to_string()
        } else {
            match messages.last() {
                Some(Message::Assistant { content, .. }) if !content.trim().is_empty() => {
                    content.clone()
                }
                _ => {
                    warn!(iterations, "Model returned an empty final message");
                    EMPTY_RESPONSE_TEXT.to_string()
                }
            }
        };

        info!(iterations, tool_calls_made, exhausted, "Run complete");

        Ok(AgentOutcome {
            final_text,
            appended: messages.split_off(base_len),
            iterations,
            tool_calls_made,
            exhausted,
            usage,
        })
    }

    /// One model call, bounded by the model timeout and the cancel token.
    async fn reason(
        &self,
        messages: &[Message],
        definitions: &[voxagent_core::ToolDefinition],
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, AgentError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            tools: definitions.to_vec(),
            sampling: self.sampling.clone(),
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            outcome = tokio::time::timeout(self.model_timeout, self.provider.complete(request)) => {
                match outcome {
                    Ok(Ok(response)) => Ok(response),
                    Ok(Err(e)) => {
                        warn!(provider = self.provider.name(), error = %e, "Model call failed");
                        Err(AgentError::Model(e))
                    }
                    Err(_) => Err(AgentError::Model(ProviderError::Timeout {
                        timeout_secs: self.model_timeout.as_secs(),
                    })),
                }
            }
        }
    }

    /// Resolve all calls concurrently; results keep the declared call order.
    async fn act(&self, calls: &[ToolCall], cancel: &CancellationToken) -> Result<Vec<Message>, AgentError> {
        debug!(tool_count = calls.len(), "Acting");

        let invocations = calls.iter().map(|call| async move {
            let content = match self.tools.invoke(call).await {
                Ok(output) => output,
                Err(e) => self.tools.failure_text(&e),
            };
            Message::tool_result(&call.id, content)
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            results = join_all(invocations) => Ok(results),
        }
    }
}

async fn publish(events: Option<&mpsc::Sender<AgentEvent>>, iteration: u32, messages: &[Message]) {
    if let Some(tx) = events {
        let event = AgentEvent {
            iteration,
            history: messages.to_vec(),
        };
        // A gone consumer is not the loop's problem.
        let _ = tx.send(event).await;
    }
}

fn add_usage(total: Option<Usage>, next: &Usage) -> Usage {
    match total {
        Some(t) => Usage {
            prompt_tokens: t.prompt_tokens.saturating_add(next.prompt_tokens),
            completion_tokens: t.completion_tokens.saturating_add(next.completion_tokens),
            total_tokens: t.total_tokens.saturating_add(next.total_tokens),
        },
        None => next.clone(),
    }
}
