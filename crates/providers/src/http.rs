//! HTTP client for a workflow-style generation provider.
//!
//! Each component run is submitted as `POST {base}/workflow-runs` with a
//! bearer token, the component-specific input, and the webhook the
//! provider calls on completion.

use std::time::Duration;

use adgen_core::component::ComponentKind;
use adgen_core::input::{ComponentInput, Prompt};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::provider::{GenerationProvider, GenerationRequest, ProviderError, ProviderTicket};

/// HTTP request timeout for a single submission.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Body of a workflow run submission.
#[derive(Debug, Serialize)]
struct SubmitRunRequest<'a> {
    workflow: ComponentKind,
    webhook_url: &'a str,
    input: serde_json::Value,
}

/// Response to a workflow run submission.
#[derive(Debug, Deserialize)]
struct SubmitRunResponse {
    id: String,
    /// `running`, `completed` or `failed`.
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpGenerationProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpGenerationProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling across
    /// providers).
    pub fn with_client(client: reqwest::Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            base_url: config.provider_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, otherwise surface
    /// the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Provider-facing input for one component.
fn workflow_input(input: &ComponentInput) -> serde_json::Value {
    match &input.prompt {
        Prompt::Music(music) => serde_json::json!({
            "music_prompt": music.describe(),
            "duration_in_seconds": input.duration_secs,
        }),
        Prompt::Voice(voice) => serde_json::json!({
            "voice": voice.voice,
            "text": voice.text,
            "duration_in_seconds": input.duration_secs,
        }),
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn start(&self, request: GenerationRequest) -> Result<ProviderTicket, ProviderError> {
        let body = SubmitRunRequest {
            workflow: request.component,
            webhook_url: &request.callback_url,
            input: workflow_input(&request.input),
        };

        let response = self
            .client
            .post(format!("{}/workflow-runs", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let run: SubmitRunResponse = Self::parse_response(response).await?;

        if run.status.as_deref() == Some("failed") {
            return Err(ProviderError::Rejected(
                run.error.unwrap_or_else(|| "run failed on submission".to_string()),
            ));
        }

        tracing::debug!(
            job_id = %request.job_id,
            component = %request.component,
            run_id = %run.id,
            "Provider accepted generation run",
        );
        Ok(ProviderTicket { run_id: run.id })
    }
}
