use adgen_core::component::{ComponentCallback, ComponentKind};
use adgen_core::error::CoreError;
use adgen_core::input::ComponentInput;
use adgen_core::types::JobId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything a provider needs to start generating one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub job_id: JobId,
    pub component: ComponentKind,
    pub input: ComponentInput,
    /// Where the provider must report the result.
    pub callback_url: String,
}

/// Receipt for an accepted generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTicket {
    /// Provider-assigned run identifier.
    pub run_id: String,
}

/// A provider refused or could not receive a generation request.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The provider accepted the HTTP call but refused the run.
    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    #[error("No provider configured for component '{0}'")]
    Unsupported(ComponentKind),
}

/// Starts asynchronous generation runs.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Submit a run. Returns once the provider accepted it; the result is
    /// delivered later through the request's callback address.
    async fn start(&self, request: GenerationRequest) -> Result<ProviderTicket, ProviderError>;
}

/// Receives component callbacks without a network hop.
#[async_trait]
pub trait CallbackSink: Send + Sync {
    async fn deliver(&self, callback: ComponentCallback) -> Result<(), CoreError>;
}
