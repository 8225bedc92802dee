//! The orchestration core of voxagent.
//!
//! A turn follows a **reason → act** cycle:
//!
//! 1. **Reason**: send the session history plus the new user message to the model
//! 2. **Decide**: if the reply requests tools, act; otherwise finish
//! 3. **Act**: run the requested tools, append their results, reason again
//! 4. **Done**: commit the user message and final reply to the session
//!
//! The cycle stops when the model answers with text only, or when the
//! iteration guard trips. Every append is published as an [`AgentEvent`];
//! [`DeltaReconstructor`] turns those snapshots into streamed text.

pub mod delta;
pub mod dispatch;
pub mod service;
pub mod session_store;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use delta::DeltaReconstructor;
pub use dispatch::{AgentOutcome, DispatchLoop, LoopState};
pub use service::{AgentService, AgentSettings};
pub use session_store::SessionStore;
pub use stream_event::{AgentEvent, StreamFrame};
pub use tokio_util::sync::CancellationToken;
