//! The job store contract.

use adgen_core::component::{ComponentKind, ComponentResult};
use adgen_core::error::CoreError;
use adgen_core::job::{Job, JobOutcome, MergeOutcome, Transition};
use adgen_core::types::JobId;
use async_trait::async_trait;
use serde::Deserialize;

/// Maximum page size for owner listings.
const MAX_LIMIT: i64 = 100;

/// Default page size for owner listings.
const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {0} already exists")]
    AlreadyExists(JobId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row could not be decoded into a [`Job`].
    #[error("Corrupt job record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoreError::job_not_found(id),
            StoreError::AlreadyExists(id) => CoreError::AlreadyExists {
                entity: "Job",
                id: id.to_string(),
            },
            StoreError::Database(e) => CoreError::Unavailable(e.to_string()),
            corrupt @ StoreError::Corrupt { .. } => CoreError::Internal(corrupt.to_string()),
        }
    }
}

/// Pagination for `list_by_owner`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct JobListQuery {
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

impl JobListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Durable keyed storage for job records.
///
/// `merge_component` and `finish` are atomic per job: implementations
/// apply [`Job::merge_component`] / [`Job::finish`] while holding that
/// job's lock, so concurrent merges of different components never lose
/// an update and duplicate merges of the same component are no-ops.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job. Fails with [`StoreError::AlreadyExists`] on an id
    /// collision.
    async fn create(&self, job: &Job) -> Result<(), StoreError>;

    /// Current snapshot of a job.
    async fn get(&self, id: &JobId) -> Result<Job, StoreError>;

    /// Set a component result if the component has none yet.
    async fn merge_component(
        &self,
        id: &JobId,
        component: ComponentKind,
        result: ComponentResult,
    ) -> Result<MergeOutcome, StoreError>;

    /// Compare-and-set a running job into a terminal state.
    async fn finish(&self, id: &JobId, outcome: JobOutcome) -> Result<Transition, StoreError>;

    /// Jobs owned by `owner`, newest first.
    async fn list_by_owner(&self, owner: &str, query: &JobListQuery)
        -> Result<Vec<Job>, StoreError>;

    /// Confirm the backing storage is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}
