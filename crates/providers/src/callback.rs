//! Inbound provider webhook payloads.

use adgen_core::component::ComponentOutcome;
use serde::Deserialize;

/// Body a provider posts to `/api/v1/callbacks/{job_id}/{component}`.
///
/// Providers differ in shape: some send a run status plus output object,
/// others only the output or only an error. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<CallbackOutput>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackOutput {
    #[serde(default, alias = "generated_music", alias = "audio_url")]
    pub url: Option<String>,
}

impl CallbackPayload {
    /// Interpret the payload.
    ///
    /// Returns `None` for progress notifications (no error, no output, and
    /// no terminal status), which carry nothing to reconcile.
    pub fn into_outcome(self) -> Option<ComponentOutcome> {
        if let Some(error) = self.error.filter(|e| !e.trim().is_empty()) {
            return Some(ComponentOutcome::Failed { error });
        }

        let status = self.status.as_deref().map(str::to_ascii_lowercase);
        if matches!(status.as_deref(), Some("failed" | "error")) {
            return Some(ComponentOutcome::Failed {
                error: "provider reported a failed run".to_string(),
            });
        }

        let url = self.output.and_then(|o| o.url);
        match (url, status.as_deref()) {
            (Some(url), _) if !url.trim().is_empty() => Some(ComponentOutcome::Succeeded { url }),
            // Completed without a usable URL counts as a component failure.
            (Some(_), _) | (None, Some("completed" | "success")) => {
                Some(ComponentOutcome::Failed {
                    error: "provider reported completion without an output URL".to_string(),
                })
            }
            (None, _) => None,
        }
    }
}
