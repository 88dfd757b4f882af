//! Folding provider callbacks into job records.
//!
//! The [`Reconciler`] is the only writer of component results and, apart
//! from cancellation and expiry, of terminal transitions. All atomicity
//! comes from the store: [`JobStore::merge_component`] is set-if-absent
//! and [`JobStore::finish`] is compare-and-set on `running`, so any number
//! of concurrent or repeated callbacks converge on one outcome.
//!
//! A component failure fails the whole job immediately.

use std::sync::Arc;

use adgen_core::component::{ComponentCallback, ComponentKind, ComponentOutcome, ComponentResult};
use adgen_core::error::CoreError;
use adgen_core::job::{Job, JobOutcome, JobStatus, MergeOutcome, Transition};
use adgen_core::types::JobId;
use adgen_db::JobStore;
use adgen_events::{event_types, EventBus, PlatformEvent};
use adgen_providers::CallbackSink;
use async_trait::async_trait;
use serde::Serialize;

use crate::composer::OutputComposer;

/// What a callback did to its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Result recorded; other components are still outstanding.
    Merged,
    /// Result recorded and the job completed.
    Completed,
    /// The job failed as a consequence of this callback.
    Failed,
    /// The component already had a result.
    Duplicate,
    /// The job was already terminal.
    TerminalNoop,
}

impl ReconcileOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ReconcileOutcome::Merged => "merged",
            ReconcileOutcome::Completed => "completed",
            ReconcileOutcome::Failed => "failed",
            ReconcileOutcome::Duplicate => "duplicate",
            ReconcileOutcome::TerminalNoop => "terminal_noop",
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn JobStore>,
    composer: Arc<dyn OutputComposer>,
    event_bus: Arc<EventBus>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn JobStore>,
        composer: Arc<dyn OutputComposer>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            composer,
            event_bus,
        }
    }

    /// Apply one component callback.
    ///
    /// Errors: `NotFound` for an unknown job or a component the job does
    /// not use (nothing is written), `Validation` for a success without a
    /// URL, `Unavailable` when the store cannot be reached.
    pub async fn handle(&self, callback: ComponentCallback) -> Result<ReconcileOutcome, CoreError> {
        let ComponentCallback {
            job_id,
            component,
            outcome,
        } = callback;

        let job = self.store.get(&job_id).await?;
        if !job.requires(component) {
            return Err(component_not_found(component));
        }
        if job.is_terminal() {
            tracing::debug!(%job_id, %component, status = %job.status, "Callback for terminal job ignored");
            return Ok(ReconcileOutcome::TerminalNoop);
        }

        match outcome {
            ComponentOutcome::Succeeded { url } => self.merge_success(&job, component, url).await,
            ComponentOutcome::Failed { error } => self.merge_failure(&job, component, error).await,
        }
    }

    /// Force a running job into `canceled`.
    pub async fn cancel(&self, id: &JobId) -> Result<Job, CoreError> {
        self.force(id, JobOutcome::Canceled).await
    }

    /// Fail a running job that outlived its deadline.
    pub async fn expire(&self, id: &JobId, reason: impl Into<String>) -> Result<Job, CoreError> {
        self.force(
            id,
            JobOutcome::Failed {
                reason: reason.into(),
            },
        )
        .await
    }

    async fn force(&self, id: &JobId, outcome: JobOutcome) -> Result<Job, CoreError> {
        let target = outcome.status();
        match self.store.finish(id, outcome).await? {
            Transition::Applied => {
                let job = self.store.get(id).await?;
                self.publish_terminal(&job);
                tracing::info!(job_id = %id, status = %target, "Job forced into terminal state");
                Ok(job)
            }
            Transition::AlreadyTerminal(status) => Err(CoreError::Conflict(format!(
                "Job {id} is already {status} and cannot become {target}"
            ))),
            Transition::Unsatisfied => Err(CoreError::Internal(format!(
                "Job {id} rejected transition to {target}"
            ))),
        }
    }

    async fn merge_success(
        &self,
        job: &Job,
        component: ComponentKind,
        url: String,
    ) -> Result<ReconcileOutcome, CoreError> {
        if url.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "{component} result for job {} has an empty URL",
                job.id
            )));
        }

        let merge = self
            .store
            .merge_component(&job.id, component, ComponentResult::ready(url.clone()))
            .await?;

        match merge {
            MergeOutcome::Applied { satisfied } => {
                tracing::info!(job_id = %job.id, %component, satisfied, "Component result merged");
                self.event_bus.publish(
                    PlatformEvent::new(event_types::COMPONENT_MERGED)
                        .for_job(&job.id, job.owner.clone())
                        .with_component(component)
                        .with_payload(serde_json::json!({ "url": url })),
                );
                if satisfied {
                    self.complete(&job.id).await
                } else {
                    Ok(ReconcileOutcome::Merged)
                }
            }
            // A previous completion attempt never landed.
            MergeOutcome::Duplicate { satisfied: true } => {
                tracing::info!(job_id = %job.id, %component, "Satisfied job still running, retrying completion");
                match self.complete(&job.id).await? {
                    ReconcileOutcome::TerminalNoop => Ok(ReconcileOutcome::Duplicate),
                    outcome => Ok(outcome),
                }
            }
            MergeOutcome::Duplicate { satisfied: false } => {
                tracing::debug!(job_id = %job.id, %component, "Duplicate component result ignored");
                Ok(ReconcileOutcome::Duplicate)
            }
            MergeOutcome::Terminal(_) => Ok(ReconcileOutcome::TerminalNoop),
            MergeOutcome::NotRequired => Err(component_not_found(component)),
        }
    }

    async fn merge_failure(
        &self,
        job: &Job,
        component: ComponentKind,
        error: String,
    ) -> Result<ReconcileOutcome, CoreError> {
        let merge = self
            .store
            .merge_component(&job.id, component, ComponentResult::failed(error.clone()))
            .await?;

        let error = match merge {
            MergeOutcome::Applied { .. } => {
                tracing::warn!(job_id = %job.id, %component, %error, "Component generation failed");
                error
            }
            MergeOutcome::Duplicate { .. } => {
                // Re-fail only if the recorded result is itself a failure whose
                // transition never landed.
                let current = self.store.get(&job.id).await?;
                match current.components.get(&component) {
                    Some(ComponentResult::Failed { error, .. }) if !current.is_terminal() => {
                        error.clone()
                    }
                    _ => return Ok(ReconcileOutcome::Duplicate),
                }
            }
            MergeOutcome::Terminal(_) => return Ok(ReconcileOutcome::TerminalNoop),
            MergeOutcome::NotRequired => return Err(component_not_found(component)),
        };

        let reason = format!("{component} generation failed: {error}");
        self.finish(&job.id, JobOutcome::Failed { reason }).await
    }

    async fn complete(&self, id: &JobId) -> Result<ReconcileOutcome, CoreError> {
        let job = self.store.get(id).await?;
        let outcome = match self.composer.compose(&job).await {
            Ok(output) => JobOutcome::Completed { output },
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Output composition failed");
                JobOutcome::Failed {
                    reason: format!("output composition failed: {e}"),
                }
            }
        };
        self.finish(id, outcome).await
    }

    async fn finish(&self, id: &JobId, outcome: JobOutcome) -> Result<ReconcileOutcome, CoreError> {
        let status = outcome.status();
        match self.store.finish(id, outcome).await? {
            Transition::Applied => {
                let job = self.store.get(id).await?;
                self.publish_terminal(&job);
                tracing::info!(job_id = %id, %status, "Job finished");
                Ok(match status {
                    JobStatus::Completed => ReconcileOutcome::Completed,
                    _ => ReconcileOutcome::Failed,
                })
            }
            Transition::AlreadyTerminal(current) => {
                tracing::debug!(job_id = %id, %current, "Job finished concurrently");
                Ok(ReconcileOutcome::TerminalNoop)
            }
            Transition::Unsatisfied => {
                tracing::warn!(job_id = %id, "Completion requested before all components were ready");
                Ok(ReconcileOutcome::Merged)
            }
        }
    }

    fn publish_terminal(&self, job: &Job) {
        let (event_type, payload) = match job.status {
            JobStatus::Completed => (
                event_types::JOB_COMPLETED,
                serde_json::json!({ "output": job.output }),
            ),
            JobStatus::Failed => (
                event_types::JOB_FAILED,
                serde_json::json!({ "reason": job.failure_reason }),
            ),
            JobStatus::Canceled => (event_types::JOB_CANCELED, serde_json::json!({})),
            JobStatus::Running => return,
        };
        self.event_bus.publish(
            PlatformEvent::new(event_type)
                .for_job(&job.id, job.owner.clone())
                .with_payload(payload),
        );
    }
}

fn component_not_found(component: ComponentKind) -> CoreError {
    CoreError::NotFound {
        entity: "Component",
        id: component.to_string(),
    }
}

#[async_trait]
impl CallbackSink for Reconciler {
    async fn deliver(&self, callback: ComponentCallback) -> Result<(), CoreError> {
        self.handle(callback).await.map(|_| ())
    }
}
