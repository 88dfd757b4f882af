use std::fmt;

use adgen_core::component::ComponentKind;
use adgen_core::types::JobId;

/// Path under the callback base address where providers report results.
pub const CALLBACK_PATH: &str = "/api/v1/callbacks";

/// Connection settings handed to the dispatcher at construction.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Base HTTP URL of the generation provider, e.g. `https://api.provider.dev/v1`.
    pub provider_base_url: String,
    /// Bearer token sent with every provider request.
    pub api_key: String,
    /// Public base address of this service, used to build callback URLs.
    pub callback_base_address: String,
}

impl ProviderConfig {
    /// Callback address encoding `(job_id, component)`.
    pub fn callback_url(&self, job_id: &JobId, component: ComponentKind) -> String {
        format!(
            "{}{CALLBACK_PATH}/{job_id}/{component}",
            self.callback_base_address.trim_end_matches('/'),
        )
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider_base_url", &self.provider_base_url)
            .field("api_key", &"<redacted>")
            .field("callback_base_address", &self.callback_base_address)
            .finish()
    }
}
