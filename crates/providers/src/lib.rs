//! Model invocation adapters for voxagent.
//!
//! All providers implement the `voxagent_core::Provider` trait.
//! [`build_from_config`] picks the adapter named in configuration.

pub mod factory;
pub mod ollama;
pub mod openai_compat;

pub use factory::build_from_config;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;

use voxagent_core::ProviderError;

/// Map a non-success HTTP status to a provider error.
pub(crate) fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        404 => ProviderError::ModelNotFound(body),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

/// Build the shared HTTP client used by every adapter.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// Synthesize a tool call id for backends that do not return one.
pub(crate) fn synthesize_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}
