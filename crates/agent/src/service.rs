//! The surface the outside world calls: one turn at a time, per session.
//!
//! `AgentService` ties the dispatch loop to the session store. A turn holds
//! its session for its whole duration and commits exactly two messages
//! (the user message and the final assistant message) once the loop
//! succeeds. Failed or cancelled turns leave the session untouched.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use voxagent_config::{AppConfig, BusyPolicy};
use voxagent_core::error::AgentError;
use voxagent_core::message::Message;
use voxagent_core::provider::{Provider, SamplingOptions};
use voxagent_core::session::{DEFAULT_HISTORY_LIMIT, SessionId};
use voxagent_core::tool::ToolRegistry;

use crate::delta::DeltaReconstructor;
use crate::dispatch::{DEFAULT_MAX_ITERATIONS, DispatchLoop};
use crate::session_store::SessionStore;
use crate::stream_event::{AgentEvent, StreamFrame};

/// Capacity of the loop → reconstructor event channel.
const EVENT_BUFFER: usize = 16;

/// Tunables for [`AgentService`].
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub sampling: SamplingOptions,
    pub max_iterations: u32,
    /// Messages kept after the directive once a turn completes.
    pub history_limit: usize,
    pub model_timeout: Duration,
    pub busy_policy: BusyPolicy,
    /// Frames buffered for a slow `stream_turn` consumer.
    pub stream_buffer: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "llama3.2:3b".into(),
            sampling: SamplingOptions::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            model_timeout: Duration::from_secs(120),
            busy_policy: BusyPolicy::default(),
            stream_buffer: 32,
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.name.clone(),
            sampling: config.model.sampling(),
            max_iterations: config.agent.max_iterations,
            history_limit: config.agent.history_limit,
            model_timeout: config.agent.model_timeout(),
            busy_policy: config.agent.busy_policy,
            ..Self::default()
        }
    }
}

/// Runs turns against per-session history.
#[derive(Clone)]
pub struct AgentService {
    dispatch: Arc<DispatchLoop>,
    store: Arc<SessionStore>,
    settings: AgentSettings,
}

impl AgentService {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        store: Arc<SessionStore>,
        settings: AgentSettings,
    ) -> Self {
        let dispatch = DispatchLoop::new(provider, tools, settings.model.clone())
            .with_sampling(settings.sampling.clone())
            .with_max_iterations(settings.max_iterations)
            .with_model_timeout(settings.model_timeout);
        Self {
            dispatch: Arc::new(dispatch),
            store,
            settings,
        }
    }

    /// Wire a service straight from configuration.
    pub fn from_config(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, config: &AppConfig) -> Self {
        let store = Arc::new(SessionStore::new(config.agent.system_prompt.clone()));
        Self::new(provider, tools, store, AgentSettings::from_config(config))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run one turn to completion and return the final text.
    pub async fn run_turn(&self, session_id: &str, user_text: &str) -> Result<String, AgentError> {
        self.run_turn_with_cancel(session_id, user_text, CancellationToken::new())
            .await
    }

    /// Like [`run_turn`](Self::run_turn), aborting at the next suspension
    /// point once `cancel` fires. A cancelled turn commits nothing.
    pub async fn run_turn_with_cancel(
        &self,
        session_id: &str,
        user_text: &str,
        cancel: CancellationToken,
    ) -> Result<String, AgentError> {
        self.execute(session_id, user_text, None, &cancel).await
    }

    /// Run one turn, yielding text deltas and then exactly one terminal frame.
    ///
    /// Dropping the returned stream cancels the turn.
    pub fn stream_turn(
        &self,
        session_id: impl Into<String>,
        user_text: impl Into<String>,
    ) -> impl Stream<Item = StreamFrame> + Send + 'static {
        let (frame_tx, frame_rx) = mpsc::channel(self.settings.stream_buffer.max(1));
        let service = self.clone();
        let session_id = session_id.into();
        let user_text = user_text.into();

        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let (event_tx, mut event_rx) = mpsc::channel::<AgentEvent>(EVENT_BUFFER);
            let mut reconstructor = DeltaReconstructor::new();

            let turn = service.execute(&session_id, &user_text, Some(event_tx), &cancel);
            tokio::pin!(turn);

            let result = loop {
                tokio::select! {
                    result = &mut turn => break result,
                    Some(event) = event_rx.recv() => {
                        if let Some(delta) = reconstructor.observe(&event) {
                            if frame_tx.send(StreamFrame::delta(delta)).await.is_err() {
                                cancel.cancel();
                            }
                        }
                    }
                    _ = frame_tx.closed(), if !cancel.is_cancelled() => {
                        info!(session = %session_id, "Stream consumer went away, cancelling turn");
                        cancel.cancel();
                    }
                }
            };

            // Events published just before the loop finished.
            while let Ok(event) = event_rx.try_recv() {
                if let Some(delta) = reconstructor.observe(&event) {
                    let _ = frame_tx.send(StreamFrame::delta(delta)).await;
                }
            }

            let terminal = match result {
                Ok(full) => reconstructor.finish(full),
                Err(e) => StreamFrame::Error {
                    message: e.to_string(),
                },
            };
            let _ = frame_tx.send(terminal).await;
        });

        ReceiverStream::new(frame_rx)
    }

    /// Reset a session to just its directive.
    pub async fn clear(&self, session_id: &str) -> Result<(), AgentError> {
        let id = SessionId::parse(session_id)?;
        self.store.clear(&id).await;
        Ok(())
    }

    /// A copy of a session's committed history.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Message>, AgentError> {
        let id = SessionId::parse(session_id)?;
        Ok(self.store.history(&id).await?)
    }

    async fn execute(
        &self,
        session_id: &str,
        user_text: &str,
        events: Option<mpsc::Sender<AgentEvent>>,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        if user_text.trim().is_empty() {
            return Err(AgentError::EmptyInput);
        }
        let id = SessionId::parse(session_id)?;

        let mut session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            guard = self.store.acquire(&id, self.settings.busy_policy) => guard?,
        };

        let user = Message::user(user_text);
        let outcome = self
            .dispatch
            .run(session.history(), user.clone(), events.as_ref(), cancel)
            .await
            .inspect_err(|e| warn!(session = %id, error = %e, "Turn failed, nothing committed"))?;

        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        if let Some(err) = outcome.exhaustion() {
            warn!(session = %id, error = %err, "Committing fallback reply");
        }

        session.append_turn(user, outcome.final_message(), self.settings.history_limit);
        info!(
            session = %id,
            iterations = outcome.iterations,
            tool_calls = outcome.tool_calls_made,
            history_len = session.history().len(),
            "Turn committed"
        );

        Ok(outcome.final_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use futures::StreamExt;
    use voxagent_core::error::{AgentErrorKind, ProviderError, SessionError};
    use voxagent_core::message::ToolCall;

    const DIRECTIVE: &str = "You are a helpful assistant.";

    fn service_with(provider: Arc<dyn Provider>, tools: ToolRegistry, settings: AgentSettings) -> AgentService {
        AgentService::new(
            provider,
            Arc::new(tools),
            Arc::new(SessionStore::new(DIRECTIVE)),
            settings,
        )
    }

    fn service(provider: Arc<dyn Provider>) -> AgentService {
        service_with(provider, ToolRegistry::new(), AgentSettings::default())
    }

    #[tokio::test]
    async fn run_turn_commits_user_and_final_only() {
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            vec![make_tool_call("lookup", serde_json::json!({"query": "x"}))],
            "Looking it up.",
            "Here you go.",
        ));
        let tools = ToolRegistry::new().with_tool(Box::new(SleepyTool {
            name: "lookup",
            delay: Duration::ZERO,
            output: "x",
        }));
        let svc = service_with(provider, tools, AgentSettings::default());

        let text = svc.run_turn("s1", "Find x").await.unwrap();
        assert_eq!(text, "Here you go.");

        let history = svc.history("s1").await.unwrap();
        assert_eq!(
            history,
            vec![
                Message::system(DIRECTIVE),
                Message::user("Find x"),
                Message::assistant("Here you go."),
            ]
        );
    }

    #[tokio::test]
    async fn history_is_capped_after_every_turn() {
        let provider = Arc::new(EchoProvider {
            delay: Duration::ZERO,
        });
        let svc = service(provider);

        for i in 0..15 {
            svc.run_turn("s", &format!("q{i}")).await.unwrap();
            let history = svc.history("s").await.unwrap();
            assert!(history.len() <= 21);
            assert_eq!(history[0], Message::system(DIRECTIVE));
        }

        let history = svc.history("s").await.unwrap();
        assert_eq!(history.len(), 21);
        assert_eq!(history[1], Message::user("q5"));
        assert_eq!(history[20], Message::assistant("echo: q14"));
    }

    #[tokio::test]
    async fn model_error_commits_nothing() {
        let provider = Arc::new(SequentialMockProvider::scripted(vec![Err(
            ProviderError::RateLimited {
                retry_after_secs: 5,
            },
        )]));
        let svc = service(provider);

        let err = svc.run_turn("s", "hello").await.unwrap_err();
        assert_eq!(err.kind(), AgentErrorKind::Model);
        assert_eq!(
            svc.history("s").await.unwrap(),
            vec![Message::system(DIRECTIVE)]
        );
    }

    #[tokio::test]
    async fn empty_input_rejected_before_session() {
        let svc = service(Arc::new(SequentialMockProvider::new(vec![])));
        let err = svc.run_turn("s", "   ").await.unwrap_err();
        assert_eq!(err.kind(), AgentErrorKind::EmptyInput);
        assert!(svc.history("s").await.is_err());
    }

    #[tokio::test]
    async fn invalid_session_id_is_session_error() {
        let svc = service(Arc::new(SequentialMockProvider::new(vec![])));
        let err = svc.run_turn("  ", "hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Session(SessionError::InvalidId(_))));
    }

    #[tokio::test]
    async fn padded_session_id_does_not_alias() {
        let svc = service(Arc::new(SequentialMockProvider::single_text("hey")));
        svc.run_turn("a", "hi").await.unwrap();

        let err = svc.run_turn(" a", "hi again").await.unwrap_err();
        assert!(matches!(err, AgentError::Session(SessionError::InvalidId(_))));
        assert_eq!(svc.history("a").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn clear_resets_to_directive() {
        let svc = service(Arc::new(SequentialMockProvider::single_text("hey")));
        svc.run_turn("s", "hi").await.unwrap();
        svc.clear("s").await.unwrap();
        assert_eq!(
            svc.history("s").await.unwrap(),
            vec![Message::system(DIRECTIVE)]
        );
    }

    #[tokio::test]
    async fn distinct_sessions_do_not_interleave() {
        let provider = Arc::new(EchoProvider {
            delay: Duration::from_millis(20),
        });
        let svc = service(provider);

        let (a, b) = tokio::join!(
            async {
                svc.run_turn("alice", "one").await?;
                svc.run_turn("alice", "two").await
            },
            async {
                svc.run_turn("bob", "uno").await?;
                svc.run_turn("bob", "dos").await
            }
        );
        assert_eq!(a.unwrap(), "echo: two");
        assert_eq!(b.unwrap(), "echo: dos");

        let alice = svc.history("alice").await.unwrap();
        let bob = svc.history("bob").await.unwrap();
        let contents = |h: &[Message]| h.iter().skip(1).map(|m| m.content().to_string()).collect::<Vec<_>>();
        assert_eq!(contents(alice.as_slice()), vec!["one", "echo: one", "two", "echo: two"]);
        assert_eq!(contents(bob.as_slice()), vec!["uno", "echo: uno", "dos", "echo: dos"]);
    }

    #[tokio::test]
    async fn busy_session_rejected_under_reject_policy() {
        let gated = Arc::new(GatedProvider::new("first done"));
        let settings = AgentSettings {
            busy_policy: BusyPolicy::Reject,
            ..AgentSettings::default()
        };
        let svc = service_with(gated.clone(), ToolRegistry::new(), settings);

        let first = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.run_turn("s", "first").await })
        };
        gated.entered.notified().await;

        let err = svc.run_turn("s", "second").await.unwrap_err();
        assert!(matches!(err, AgentError::Session(SessionError::Busy(_))));

        gated.release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "first done");
        assert_eq!(svc.history("s").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn busy_session_waits_under_wait_policy() {
        let gated = Arc::new(GatedProvider::new("ok"));
        let svc = service_with(gated.clone(), ToolRegistry::new(), AgentSettings::default());

        let first = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.run_turn("s", "first").await })
        };
        gated.entered.notified().await;

        let second = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.run_turn("s", "second").await })
        };

        gated.release.notify_one();
        first.await.unwrap().unwrap();
        gated.entered.notified().await;
        gated.release.notify_one();
        second.await.unwrap().unwrap();

        let history = svc.history("s").await.unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[1], Message::user("first"));
        assert_eq!(history[3], Message::user("second"));
    }

    #[tokio::test]
    async fn cancelled_turn_commits_nothing() {
        let gated = Arc::new(GatedProvider::new("never seen"));
        let svc = service(gated.clone());
        let cancel = CancellationToken::new();

        let turn = {
            let svc = svc.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { svc.run_turn_with_cancel("s", "hi", cancel).await })
        };
        gated.entered.notified().await;
        cancel.cancel();

        let err = turn.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), AgentErrorKind::Cancelled);
        assert_eq!(
            svc.history("s").await.unwrap(),
            vec![Message::system(DIRECTIVE)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_tool_call_commits_nothing() {
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            vec![make_tool_call("lookup", serde_json::json!({"query": "slow"}))],
            "",
            "never reached",
        ));
        let tools = ToolRegistry::new().with_tool(Box::new(SleepyTool {
            name: "lookup",
            delay: Duration::from_secs(10),
            output: "late",
        }));
        let svc = service_with(provider.clone(), tools, AgentSettings::default());
        let cancel = CancellationToken::new();

        let turn = {
            let svc = svc.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { svc.run_turn_with_cancel("s", "hi", cancel).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let err = turn.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), AgentErrorKind::Cancelled);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(
            svc.history("s").await.unwrap(),
            vec![Message::system(DIRECTIVE)]
        );
    }

    #[tokio::test]
    async fn stream_turn_emits_deltas_then_done() {
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            vec![ToolCall::new("call_1", "lookup", serde_json::json!({"query": "q"}))],
            "Searching...",
            "The answer is 42.",
        ));
        let tools = ToolRegistry::new().with_tool(Box::new(SleepyTool {
            name: "lookup",
            delay: Duration::ZERO,
            output: "42",
        }));
        let svc = service_with(provider, tools, AgentSettings::default());

        let frames: Vec<StreamFrame> = svc.stream_turn("s", "What is the answer?").collect().await;
        assert_eq!(
            frames,
            vec![
                StreamFrame::delta("Searching..."),
                StreamFrame::delta("The answer is 42."),
                StreamFrame::Done {
                    full: "The answer is 42.".into()
                },
            ]
        );
        assert_eq!(svc.history("s").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stream_turn_reports_errors_as_terminal_frame() {
        let provider = Arc::new(SequentialMockProvider::scripted(vec![Err(
            ProviderError::Network("down".into()),
        )]));
        let svc = service(provider);

        let frames: Vec<StreamFrame> = svc.stream_turn("s", "hi").collect().await;
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], StreamFrame::Error { message } if message.contains("down")));
    }

    #[tokio::test]
    async fn dropping_stream_cancels_turn() {
        let gated = Arc::new(GatedProvider::new("never seen"));
        let svc = service(gated.clone());

        let stream = svc.stream_turn("s", "hi");
        gated.entered.notified().await;
        drop(stream);

        // The turn gives up its session lock once cancelled.
        let id = SessionId::parse("s").unwrap();
        let guard = svc.store().acquire(&id, BusyPolicy::Wait).await.unwrap();
        assert_eq!(guard.history(), &[Message::system(DIRECTIVE)]);
    }

    #[test]
    fn settings_from_config() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 3;
        config.agent.busy_policy = BusyPolicy::Reject;
        let settings = AgentSettings::from_config(&config);
        assert_eq!(settings.max_iterations, 3);
        assert_eq!(settings.busy_policy, BusyPolicy::Reject);
        assert_eq!(settings.model, "llama3.2:3b");
        assert_eq!(settings.history_limit, 20);
    }
}
