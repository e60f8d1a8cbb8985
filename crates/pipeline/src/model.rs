//! Model call wrapper shared by every pipeline stage.

use fable_core::{AppConfig, AppError, AppResult};
use fable_llm::{LlmClient, LlmRequest};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Sampling parameters and timeout applied to every call.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
    pub call_timeout: Duration,
}

impl ModelSettings {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            call_timeout: Duration::from_secs(config.call_timeout_secs),
        }
    }
}

/// A shared client plus the settings used to call it.
///
/// Cloning is cheap; clones share the underlying client.
#[derive(Clone)]
pub struct ModelCaller {
    client: Arc<dyn LlmClient>,
    settings: ModelSettings,
}

impl std::fmt::Debug for ModelCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCaller")
            .field("provider", &self.client.provider_name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ModelCaller {
    pub fn new(client: Arc<dyn LlmClient>, settings: ModelSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Send one prompt and return the trimmed completion.
    ///
    /// A call that outlives `call_timeout` or returns only whitespace is a
    /// transport error.
    pub async fn call(&self, prompt: &str) -> AppResult<String> {
        let mut request = LlmRequest::new(prompt, &self.settings.model)
            .with_temperature(self.settings.temperature)
            .with_top_p(self.settings.top_p);
        if let Some(max_tokens) = self.settings.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let timeout = self.settings.call_timeout;
        let response = tokio::time::timeout(timeout, self.client.complete(&request))
            .await
            .map_err(|_| {
                AppError::Transport(format!("model call timed out after {:?}", timeout))
            })??;

        let content = response.content.trim();
        if content.is_empty() {
            return Err(AppError::Transport(
                "model returned an empty completion".to_string(),
            ));
        }

        Ok(content.to_string())
    }
}

/// Run `future` unless `deadline` passes first.
pub(crate) async fn before_deadline<T, F>(
    deadline: Option<Instant>,
    what: &str,
    future: F,
) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, future)
            .await
            .map_err(|_| AppError::DeadlineExceeded(format!("deadline passed during {}", what)))?,
        None => future.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::FakeClient;

    fn settings(timeout_ms: u64) -> ModelSettings {
        ModelSettings {
            model: "fake".to_string(),
            temperature: 0.8,
            top_p: 0.95,
            max_tokens: Some(64),
            call_timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test]
    async fn test_call_trims_completion() {
        let client = FakeClient::new(|_| Ok("  Había una vez.\n".to_string()));
        let caller = ModelCaller::new(Arc::new(client), settings(1000));
        assert_eq!(caller.call("x").await.unwrap(), "Había una vez.");
    }

    #[tokio::test]
    async fn test_blank_completion_is_transport_error() {
        let client = FakeClient::new(|_| Ok(" \n ".to_string()));
        let caller = ModelCaller::new(Arc::new(client), settings(1000));
        assert!(caller.call("x").await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let client = FakeClient::new(|_| Ok("tarde".to_string()))
            .with_delay(|_| Duration::from_millis(500));
        let caller = ModelCaller::new(Arc::new(client), settings(20));
        let err = caller.call("x").await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_request_carries_sampling_settings() {
        let client = Arc::new(FakeClient::new(|_| Ok("ok".to_string())));
        let caller = ModelCaller::new(client.clone(), settings(1000));
        caller.call("hola").await.unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "hola");
        assert_eq!(requests[0].temperature, Some(0.8));
        assert_eq!(requests[0].max_tokens, Some(64));
    }

    #[tokio::test]
    async fn test_before_deadline() {
        let past = Some(Instant::now());
        let err = before_deadline(past, "combine", async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "deadline");

        let value = before_deadline(None, "combine", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
