//! Job components: the independently generated sub-assets of a job and
//! the results providers report for them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

/// One independently generated sub-asset of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    Music,
    #[serde(alias = "vo")]
    VoiceOver,
}

impl ComponentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Music => "music",
            ComponentKind::VoiceOver => "voiceOver",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "music" => Ok(ComponentKind::Music),
            "voiceOver" | "voice_over" | "vo" => Ok(ComponentKind::VoiceOver),
            other => Err(CoreError::NotFound {
                entity: "Component",
                id: other.to_string(),
            }),
        }
    }
}

/// The recorded result of a single component.
///
/// Written at most once per component per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ComponentResult {
    Ready { url: String, received_at: Timestamp },
    Failed { error: String, received_at: Timestamp },
}

impl ComponentResult {
    pub fn ready(url: impl Into<String>) -> Self {
        Self::Ready {
            url: url.into(),
            received_at: chrono::Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            received_at: chrono::Utc::now(),
        }
    }

    /// Media URL, if the component was generated successfully.
    pub fn url(&self) -> Option<&str> {
        match self {
            ComponentResult::Ready { url, .. } => Some(url),
            ComponentResult::Failed { .. } => None,
        }
    }

    /// A result counts toward completion only with a non-empty URL.
    pub fn is_ready(&self) -> bool {
        self.url().is_some_and(|url| !url.trim().is_empty())
    }
}

/// What a provider reported for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ComponentOutcome {
    Succeeded { url: String },
    Failed { error: String },
}

impl ComponentOutcome {
    pub fn into_result(self) -> ComponentResult {
        match self {
            ComponentOutcome::Succeeded { url } => ComponentResult::ready(url),
            ComponentOutcome::Failed { error } => ComponentResult::failed(error),
        }
    }
}

/// An asynchronous completion notification routed back to one job component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCallback {
    pub job_id: JobId,
    pub component: ComponentKind,
    pub outcome: ComponentOutcome,
}
