//! Final artifact composition.
//!
//! Once every component of a job is ready the reconciler asks an
//! [`OutputComposer`] for the job's `output`. The default
//! [`ManifestComposer`] does no audio work: it emits a JSON mix manifest
//! listing each track with its mixing parameters, which a downstream
//! renderer consumes.

use adgen_core::component::ComponentKind;
use adgen_core::job::Job;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("component '{0}' has no ready result")]
    MissingComponent(ComponentKind),

    #[error("component '{0}' has no generation input")]
    MissingInput(ComponentKind),

    #[error("failed to encode manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait OutputComposer: Send + Sync {
    async fn compose(&self, job: &Job) -> Result<String, ComposeError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestComposer;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MixManifest<'a> {
    job_id: &'a str,
    #[serde(rename = "type")]
    job_type: &'a str,
    tracks: Vec<Track<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Track<'a> {
    component: ComponentKind,
    url: &'a str,
    volume: f32,
    offset_ms: u64,
    duration_secs: u32,
}

#[async_trait]
impl OutputComposer for ManifestComposer {
    async fn compose(&self, job: &Job) -> Result<String, ComposeError> {
        let tracks = job
            .required_components()
            .iter()
            .map(|&component| {
                let url = job
                    .components
                    .get(&component)
                    .filter(|result| result.is_ready())
                    .and_then(|result| result.url())
                    .ok_or(ComposeError::MissingComponent(component))?;
                let input = job
                    .input
                    .get(&component)
                    .ok_or(ComposeError::MissingInput(component))?;
                Ok(Track {
                    component,
                    url,
                    volume: input.volume,
                    offset_ms: input.offset_ms,
                    duration_secs: input.duration_secs,
                })
            })
            .collect::<Result<Vec<_>, ComposeError>>()?;

        let manifest = MixManifest {
            job_id: job.id.as_str(),
            job_type: job.job_type.as_str(),
            tracks,
        };
        Ok(serde_json::to_string(&manifest)?)
    }
}
