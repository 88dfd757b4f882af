//! Job intake: the synchronous half of a job's life.

use std::collections::BTreeMap;
use std::sync::Arc;

use adgen_core::component::ComponentKind;
use adgen_core::error::CoreError;
use adgen_core::input::{validate_job_input, ComponentInput};
use adgen_core::job::{Job, JobType};
use adgen_db::JobStore;
use adgen_events::{event_types, EventBus, PlatformEvent};
use serde::Deserialize;
use tokio::task::JoinHandle;
use validator::Validate;

use crate::dispatcher::{DispatchReport, Dispatcher};

/// Body of `POST /api/v1/jobs`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[serde(alias = "ownerId", alias = "userId")]
    #[validate(length(min = 1, max = 128))]
    pub owner_id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub input: BTreeMap<ComponentKind, ComponentInput>,
}

/// A persisted job and its in-flight dispatch.
///
/// Dropping `dispatch` does not cancel it.
#[derive(Debug)]
pub struct Submitted {
    pub job: Job,
    pub dispatch: JoinHandle<DispatchReport>,
}

pub struct JobIntake {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<Dispatcher>,
    event_bus: Arc<EventBus>,
}

impl JobIntake {
    pub fn new(store: Arc<dyn JobStore>, dispatcher: Arc<Dispatcher>, event_bus: Arc<EventBus>) -> Self {
        Self {
            store,
            dispatcher,
            event_bus,
        }
    }

    /// Validate, persist a `running` job and start its dispatch in the
    /// background. Returns as soon as the job is stored.
    pub async fn submit(&self, request: CreateJobRequest) -> Result<Submitted, CoreError> {
        request
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        validate_job_input(request.job_type, &request.input)?;

        let job = Job::new(request.owner_id, request.job_type, request.input);
        self.store.create(&job).await?;

        tracing::info!(job_id = %job.id, owner = %job.owner, job_type = %job.job_type, "Job created");
        self.event_bus.publish(
            PlatformEvent::new(event_types::JOB_CREATED)
                .for_job(&job.id, job.owner.clone())
                .with_payload(serde_json::json!({ "type": job.job_type })),
        );

        let dispatcher = Arc::clone(&self.dispatcher);
        let snapshot = job.clone();
        let dispatch = tokio::spawn(async move { dispatcher.dispatch(&snapshot).await });

        Ok(Submitted { job, dispatch })
    }
}

#[cfg(test)]
mod tests {
    use adgen_core::component::ComponentResult;
    use adgen_core::job::JobStatus;
    use adgen_core::types::JobId;
    use adgen_db::InMemoryJobStore;
    use adgen_providers::{Delivery, Script, ScriptedProvider};
    use assert_matches::assert_matches;

    use super::*;
    use crate::composer::ManifestComposer;
    use crate::reconciler::Reconciler;
    use crate::testing::{drain_events, podcast_ad_input, provider_config};

    struct Pipeline {
        store: Arc<InMemoryJobStore>,
        bus: Arc<EventBus>,
        provider: Arc<ScriptedProvider>,
        reconciler: Arc<Reconciler>,
        intake: JobIntake,
    }

    fn pipeline(configure: impl FnOnce(ScriptedProvider) -> ScriptedProvider) -> Pipeline {
        let store = Arc::new(InMemoryJobStore::new());
        let bus = Arc::new(EventBus::default());
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            Arc::new(ManifestComposer),
            bus.clone(),
        ));
        let provider = Arc::new(configure(ScriptedProvider::new(
            reconciler.clone(),
            Delivery::Manual,
        )));
        let dispatcher = Arc::new(Dispatcher::with_provider(
            provider_config(),
            provider.clone(),
            bus.clone(),
        ));
        let intake = JobIntake::new(store.clone(), dispatcher, bus.clone());
        Pipeline {
            store,
            bus,
            provider,
            reconciler,
            intake,
        }
    }

    fn request() -> CreateJobRequest {
        CreateJobRequest {
            owner_id: "user-1".into(),
            job_type: JobType::PodcastAd,
            input: podcast_ad_input(),
        }
    }

    #[tokio::test]
    async fn submitted_job_is_running_with_no_components() {
        let p = pipeline(|s| s);
        let mut rx = p.bus.subscribe();

        let submitted = p.intake.submit(request()).await.unwrap();
        submitted.dispatch.await.unwrap();

        let stored = p.store.get(&submitted.job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert!(stored.components.is_empty());
        assert_eq!(stored.owner, "user-1");
        assert_eq!(rx.recv().await.unwrap().event_type, event_types::JOB_CREATED);
    }

    #[tokio::test]
    async fn podcast_ad_flows_from_intake_to_completion() {
        let p = pipeline(|s| s);

        let submitted = p.intake.submit(request()).await.unwrap();
        let report = submitted.dispatch.await.unwrap();
        assert_eq!(report.accepted().count(), 2);
        assert_eq!(p.provider.requests().await.len(), 2);
        let id = submitted.job.id;

        p.provider.release(&id, ComponentKind::Music).await;
        let partial = p.store.get(&id).await.unwrap();
        assert_eq!(partial.status, JobStatus::Running);
        assert_eq!(
            partial.components[&ComponentKind::Music].url(),
            Some(ScriptedProvider::simulated_url(&id, ComponentKind::Music).as_str())
        );
        assert!(!partial.components.contains_key(&ComponentKind::VoiceOver));

        p.provider.release(&id, ComponentKind::VoiceOver).await;
        let done = p.store.get(&id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.output.is_some());
        assert!(done.components.values().all(ComponentResult::is_ready));
    }

    #[tokio::test]
    async fn repeated_delivery_leaves_the_first_result() {
        let p = pipeline(|s| s.with_script(ComponentKind::Music, Script::DeliverTwice));

        let submitted = p.intake.submit(request()).await.unwrap();
        submitted.dispatch.await.unwrap();

        let results = p.provider.release_all().await;
        assert!(results.iter().all(Result::is_ok));
        let done = p.store.get(&submitted.job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn dispatch_failure_leaves_the_job_running() {
        let p = pipeline(|s| {
            s.with_script(ComponentKind::Music, Script::Reject("down".into()))
                .with_script(ComponentKind::VoiceOver, Script::Reject("down".into()))
        });

        let submitted = p.intake.submit(request()).await.unwrap();
        let report = submitted.dispatch.await.unwrap();

        assert!(report.all_failed());
        let stored = p.store.get(&submitted.job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Running);

        let expired = p
            .reconciler
            .expire(&stored.id, "no provider accepted the job")
            .await
            .unwrap();
        assert_eq!(expired.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn invalid_input_creates_nothing() {
        let p = pipeline(|s| s);
        let mut bad = request();
        bad.input.remove(&ComponentKind::Music);

        let err = p.intake.submit(bad).await.unwrap_err();

        assert_matches!(err, CoreError::Validation(_));
        assert!(p.store.is_empty().await);
        assert!(p.provider.requests().await.is_empty());
    }

    #[tokio::test]
    async fn blank_owner_is_rejected() {
        let p = pipeline(|s| s);
        let mut bad = request();
        bad.owner_id = String::new();

        assert_matches!(p.intake.submit(bad).await, Err(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn callback_for_unknown_job_creates_nothing() {
        let p = pipeline(|s| s);
        let mut rx = p.bus.subscribe();

        let err = p
            .reconciler
            .handle(adgen_core::component::ComponentCallback {
                job_id: JobId::from("ghost"),
                component: ComponentKind::Music,
                outcome: adgen_core::component::ComponentOutcome::Succeeded {
                    url: "https://cdn/a".into(),
                },
            })
            .await
            .unwrap_err();

        assert_matches!(err, CoreError::NotFound { .. });
        assert!(p.store.is_empty().await);
        assert!(drain_events(&mut rx).is_empty());
    }

    #[test]
    fn request_accepts_camel_case_owner_alias() {
        let body = serde_json::json!({
            "ownerId": "user-9",
            "type": "podcastAd",
            "input": {
                "music": {"prompt": {"genres": "jazz"}, "duration_secs": 20},
                "voiceOver": {"prompt": {"voice": "alloy", "text": "Hello"}, "offset_ms": 500}
            }
        });

        let request: CreateJobRequest = serde_json::from_value(body).unwrap();

        assert_eq!(request.owner_id, "user-9");
        assert_eq!(request.input.len(), 2);
        assert!(validate_job_input(request.job_type, &request.input).is_ok());
    }

    #[test]
    fn request_keeps_timing_from_long_field_names() {
        let body = serde_json::json!({
            "userId": "u1",
            "type": "podcastAd",
            "input": {
                "music": {
                    "prompt": {"genres": "lofi", "moods": "calm", "themes": "", "length": 30},
                    "durationInSeconds": 30,
                    "volume": 0.4,
                    "offsetInMilliseconds": 0
                },
                "vo": {
                    "prompt": {"voice": "alloy", "input": "Hello"},
                    "durationInSeconds": 25,
                    "volume": 1,
                    "offsetInMilliseconds": 1500
                }
            }
        });

        let request: CreateJobRequest = serde_json::from_value(body).unwrap();

        let music = &request.input[&ComponentKind::Music];
        let voice = &request.input[&ComponentKind::VoiceOver];
        assert_eq!(music.duration_secs, 30);
        assert_eq!(voice.duration_secs, 25);
        assert_eq!(voice.offset_ms, 1500);
        assert!(validate_job_input(request.job_type, &request.input).is_ok());
    }
}
