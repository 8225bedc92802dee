//! Error types for the voxagent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`AgentError`] is what
//! callers of a turn ever see.

use thiserror::Error;

// --- Bounded context errors ---

/// Failure of the model invocation adapter.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),
}

/// Failure of a single tool invocation.
///
/// Never aborts a run: the dispatch loop folds it into history as a
/// tool result so the model can react.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },
}

impl ToolError {
    /// Name of the tool that failed.
    pub fn tool_name(&self) -> &str {
        match self {
            Self::NotFound(name) => name,
            Self::ExecutionFailed { tool_name, .. }
            | Self::Timeout { tool_name, .. }
            | Self::InvalidArguments { tool_name, .. } => tool_name,
        }
    }

    /// The underlying cause, without the tool name prefix.
    pub fn cause(&self) -> String {
        match self {
            Self::NotFound(name) => format!("no tool named '{name}' is registered"),
            Self::ExecutionFailed { reason, .. } => reason.clone(),
            Self::Timeout { timeout_secs, .. } => format!("timed out after {timeout_secs}s"),
            Self::InvalidArguments { reason, .. } => format!("invalid arguments: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session '{0}' already has a turn in progress")]
    Busy(String),

    #[error("Session '{0}' does not exist")]
    NotFound(String),

    #[error("Invalid session id: {0}")]
    InvalidId(String),
}

/// Coarse classification of [`AgentError`] for callers that only branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentErrorKind {
    Model,
    Session,
    Exhausted,
    Cancelled,
    EmptyInput,
}

/// Terminal failure of a turn.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Model invocation failed: {0}")]
    Model(#[from] ProviderError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("Gave up after {iterations} reasoning iterations")]
    Exhausted { iterations: u32 },

    #[error("Turn was cancelled")]
    Cancelled,

    #[error("No message provided")]
    EmptyInput,
}

impl AgentError {
    pub fn kind(&self) -> AgentErrorKind {
        match self {
            Self::Model(_) => AgentErrorKind::Model,
            Self::Session(_) => AgentErrorKind::Session,
            Self::Exhausted { .. } => AgentErrorKind::Exhausted,
            Self::Cancelled => AgentErrorKind::Cancelled,
            Self::EmptyInput => AgentErrorKind::EmptyInput,
        }
    }
}
