//! # voxagent core
//!
//! Domain types, traits, and error definitions for the voxagent assistant.
//! This crate performs no I/O: it defines the model that the provider,
//! tool, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Each collaborator of the orchestration core is a trait here:
//! - [`Provider`]: the model invocation adapter
//! - [`Tool`]: one capability in the [`ToolRegistry`]
//!
//! Implementations live in their own crates, so tests can swap in
//! scripted stubs.

pub mod error;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, AgentErrorKind, ProviderError, SessionError, ToolError};
pub use message::{Message, ToolCall};
pub use provider::{Provider, ProviderRequest, ProviderResponse, SamplingOptions, ToolDefinition, Usage};
pub use session::{DEFAULT_HISTORY_LIMIT, Session, SessionId};
pub use tool::{Tool, ToolRegistry};
