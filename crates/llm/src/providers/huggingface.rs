//! Hugging Face Inference API provider.
//!
//! Text generation is a single `POST {base_url}/{model}` with a bearer token.
//! The API answers with a list of generations, or with an `{"error": ...}`
//! object while the model is loading or when the request is rejected.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use fable_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Inference API base URL.
pub const DEFAULT_HF_ENDPOINT: &str = "https://api-inference.huggingface.co/models";

#[derive(Debug, Serialize)]
struct HfRequest<'a> {
    inputs: &'a str,
    parameters: HfParameters,
    options: HfOptions,
}

#[derive(Debug, Serialize)]
struct HfParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_new_tokens: Option<u32>,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct HfOptions {
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
struct HfGeneration {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HfResponse {
    Generations(Vec<HfGeneration>),
    Single(HfGeneration),
    Error { error: String },
}

/// Hugging Face Inference API client.
pub struct HuggingFaceClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HuggingFaceClient {
    /// Create a client against an Inference API base URL (the public one is
    /// [`DEFAULT_HF_ENDPOINT`]).
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn url_for(&self, model: &str) -> String {
        format!("{}/{}", self.base_url, model)
    }

    fn to_hf_request<'a>(&self, request: &'a LlmRequest) -> HfRequest<'a> {
        HfRequest {
            inputs: &request.prompt,
            parameters: HfParameters {
                temperature: request.temperature,
                top_p: request.top_p,
                max_new_tokens: request.max_tokens,
                return_full_text: false,
            },
            options: HfOptions {
                wait_for_model: true,
            },
        }
    }

    fn convert_response(&self, response: HfResponse, model: &str) -> AppResult<LlmResponse> {
        let content = match response {
            HfResponse::Generations(generations) => generations
                .into_iter()
                .next()
                .map(|g| g.generated_text)
                .ok_or_else(|| {
                    AppError::Transport("Hugging Face returned no generations".to_string())
                })?,
            HfResponse::Single(generation) => generation.generated_text,
            HfResponse::Error { error } => {
                return Err(AppError::Transport(format!(
                    "Hugging Face API error: {}",
                    error
                )))
            }
        };

        Ok(LlmResponse::text(content, model))
    }
}

#[async_trait::async_trait]
impl LlmClient for HuggingFaceClient {
    fn provider_name(&self) -> &str {
        "huggingface"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let url = self.url_for(&request.model);
        tracing::debug!(url = %url, prompt_chars = request.prompt.len(), "Sending completion request to Hugging Face");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.to_hf_request(request))
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Failed to send request to Hugging Face: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Transport(format!(
                "Hugging Face API error ({}): {}",
                status, error_text
            )));
        }

        let hf_response: HfResponse = response
            .json()
            .await
            .map_err(|e| AppError::Transport(format!("Failed to parse Hugging Face response: {}", e)))?;

        let converted = self.convert_response(hf_response, &request.model)?;
        tracing::debug!(chars = converted.content.len(), "Received completion from Hugging Face");

        Ok(converted)
    }
}
