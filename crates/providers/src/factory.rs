//! Pick and construct the model adapter named in configuration.

use std::sync::Arc;
use voxagent_config::AppConfig;
use voxagent_core::{Provider, ProviderError};

use crate::{OllamaProvider, OpenAiCompatProvider};

/// Build the configured provider.
///
/// Hosted backends need an API key; `custom` needs a base URL.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let model = &config.model;
    let name = model.provider.as_str();

    let provider: Arc<dyn Provider> = match name {
        "ollama" => Arc::new(OllamaProvider::new(model.base_url.as_deref())),
        "openai" | "openrouter" => {
            let api_key = model.api_key.clone().ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "provider '{name}' requires an API key (set VOXAGENT_API_KEY)"
                ))
            })?;
            let base_url = model
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url(name).to_string());
            Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
        }
        "custom" => {
            let base_url = model.base_url.clone().ok_or_else(|| {
                ProviderError::NotConfigured(
                    "provider 'custom' requires model.base_url".into(),
                )
            })?;
            Arc::new(OpenAiCompatProvider::new(
                name,
                base_url,
                model.api_key.clone().unwrap_or_default(),
            ))
        }
        other => {
            return Err(ProviderError::NotConfigured(format!(
                "unknown provider '{other}' (expected ollama, openai, openrouter or custom)"
            )));
        }
    };

    tracing::debug!(provider = name, model = %model.name, "Provider constructed");
    Ok(provider)
}

fn default_base_url(provider_name: &str) -> &'static str {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        _ => crate::ollama::DEFAULT_OLLAMA_URL,
    }
}
