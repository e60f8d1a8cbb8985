//! LLM provider factory.
//!
//! Builds the process-wide model client once at startup from the loaded
//! configuration. The credential is resolved here and never read again.

use crate::client::LlmClient;
use crate::providers::{HuggingFaceClient, OllamaClient, DEFAULT_HF_ENDPOINT, DEFAULT_OLLAMA_ENDPOINT};
use crate::types::ProviderType;
use fable_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("huggingface", "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key (required by Hugging Face)
/// * `timeout` - HTTP timeout applied to every request
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required
/// credential is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    match provider_type {
        ProviderType::HuggingFace => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("Hugging Face provider requires API key".to_string())
            })?;
            let base_url = endpoint.unwrap_or(DEFAULT_HF_ENDPOINT);
            let client = HuggingFaceClient::with_base_url(base_url, api_key, timeout)?;
            Ok(Arc::new(client))
        }
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or(DEFAULT_OLLAMA_ENDPOINT);
            let client = OllamaClient::with_base_url(base_url, timeout)?;
            Ok(Arc::new(client))
        }
    }
}

/// Create the LLM client described by the application configuration.
pub fn create_client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let api_key = config.resolve_api_key();

    tracing::debug!(
        provider = %config.provider,
        model = %config.model,
        has_credential = api_key.is_some(),
        "Creating LLM client"
    );

    create_client(
        &config.provider,
        config.endpoint.as_deref(),
        api_key.as_deref(),
        Duration::from_secs(config.call_timeout_secs),
    )
}
