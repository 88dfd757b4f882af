//! Per-component generation parameters supplied at job creation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::component::ComponentKind;
use crate::error::CoreError;
use crate::job::JobType;

/// Generation parameters for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ComponentInput {
    pub prompt: Prompt,
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_duration_secs", alias = "durationInSeconds")]
    pub duration_secs: u32,
    /// Mix volume, 0.0 (muted) to 1.0 (full).
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Where the component starts in the final mix.
    #[serde(default, alias = "offsetInMilliseconds")]
    pub offset_ms: u64,
}

fn default_duration_secs() -> u32 {
    1
}

fn default_volume() -> f32 {
    1.0
}

/// Provider-facing prompt. The shape decides which component it fits.
///
/// `Voice` is tried first: its fields are all required, while every music
/// descriptor is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Voice(VoicePrompt),
    Music(MusicPrompt),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicPrompt {
    #[serde(default)]
    pub genres: String,
    #[serde(default)]
    pub moods: String,
    #[serde(default)]
    pub themes: String,
}

impl MusicPrompt {
    /// Flatten the descriptors into a single free-text prompt.
    pub fn describe(&self) -> String {
        [&self.genres, &self.moods, &self.themes]
            .into_iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct VoicePrompt {
    #[validate(length(min = 1, max = 64))]
    pub voice: String,
    #[validate(length(min = 1, max = 5000))]
    #[serde(alias = "input")]
    pub text: String,
}

impl Prompt {
    pub fn fits(&self, component: ComponentKind) -> bool {
        matches!(
            (self, component),
            (Prompt::Music(_), ComponentKind::Music) | (Prompt::Voice(_), ComponentKind::VoiceOver)
        )
    }
}

/// Check a creation request's inputs against the job type.
///
/// Every required component must be present with a prompt of the right
/// shape, and no extra components are accepted.
pub fn validate_job_input(
    job_type: JobType,
    input: &BTreeMap<ComponentKind, ComponentInput>,
) -> Result<(), CoreError> {
    let required = job_type.required_components();

    for component in required {
        let Some(component_input) = input.get(component) else {
            return Err(CoreError::Validation(format!(
                "Missing input for component '{component}'"
            )));
        };
        validate_component_input(*component, component_input)?;
    }

    if let Some(extra) = input.keys().find(|c| !required.contains(c)) {
        return Err(CoreError::Validation(format!(
            "Component '{extra}' is not part of a {job_type} job"
        )));
    }

    Ok(())
}

fn validate_component_input(
    component: ComponentKind,
    input: &ComponentInput,
) -> Result<(), CoreError> {
    input
        .validate()
        .map_err(|e| CoreError::Validation(format!("{component}: {e}")))?;

    if !input.prompt.fits(component) {
        return Err(CoreError::Validation(format!(
            "{component}: prompt does not match the component"
        )));
    }

    match &input.prompt {
        Prompt::Music(music) if music.describe().is_empty() => Err(CoreError::Validation(
            format!("{component}: at least one of genres, moods or themes is required"),
        )),
        Prompt::Voice(voice) => voice
            .validate()
            .map_err(|e| CoreError::Validation(format!("{component}: {e}"))),
        Prompt::Music(_) => Ok(()),
    }
}
