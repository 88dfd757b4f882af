//! PostgreSQL-backed job store for the `generation_jobs` table.
//!
//! Component results and inputs are JSONB columns. Merges and terminal
//! transitions lock the job row with `SELECT ... FOR UPDATE`, apply the
//! state machine from `adgen_core::job`, and write back only when the
//! state actually changed.

use std::collections::BTreeMap;

use adgen_core::component::{ComponentKind, ComponentResult};
use adgen_core::input::ComponentInput;
use adgen_core::job::{Job, JobOutcome, MergeOutcome, Transition};
use adgen_core::types::{JobId, Timestamp};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::store::{JobListQuery, JobStore, StoreError};

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    id, owner_id, job_type, status, components, input, \
    output, failure_reason, created_at, finished_at";

/// A raw row from the `generation_jobs` table.
#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    owner_id: String,
    job_type: String,
    status: String,
    components: serde_json::Value,
    input: serde_json::Value,
    output: Option<String>,
    failure_reason: Option<String>,
    created_at: Timestamp,
    finished_at: Option<Timestamp>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: row.id.clone(),
            reason,
        };

        let job_type = row.job_type.parse().map_err(|e| corrupt(format!("{e}")))?;
        let status = row.status.parse().map_err(|e| corrupt(format!("{e}")))?;
        let components: BTreeMap<ComponentKind, ComponentResult> =
            serde_json::from_value(row.components)
                .map_err(|e| corrupt(format!("components: {e}")))?;
        let input: BTreeMap<ComponentKind, ComponentInput> =
            serde_json::from_value(row.input).map_err(|e| corrupt(format!("input: {e}")))?;

        Ok(Job {
            id: JobId::from(row.id),
            owner: row.owner_id,
            job_type,
            status,
            components,
            input,
            output: row.output,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            finished_at: row.finished_at,
        })
    }
}

fn encode<T: serde::Serialize>(id: &JobId, value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load and row-lock a job inside `tx`.
    async fn lock_job(
        tx: &mut Transaction<'_, Postgres>,
        id: &JobId,
    ) -> Result<Job, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id.as_str())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        row.try_into()
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO generation_jobs \
                 (id, owner_id, job_type, status, components, input, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(job.id.as_str())
        .bind(&job.owner)
        .bind(job.job_type.as_str())
        .bind(job.status.as_str())
        .bind(encode(&job.id, &job.components)?)
        .bind(encode(&job.id, &job.input)?)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(job.id.clone()));
        }
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Job, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        row.try_into()
    }

    async fn merge_component(
        &self,
        id: &JobId,
        component: ComponentKind,
        result: ComponentResult,
    ) -> Result<MergeOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut job = Self::lock_job(&mut tx, id).await?;

        let outcome = job.merge_component(component, result);
        if let MergeOutcome::Applied { .. } = outcome {
            sqlx::query(
                "UPDATE generation_jobs SET components = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id.as_str())
            .bind(encode(id, &job.components)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn finish(&self, id: &JobId, outcome: JobOutcome) -> Result<Transition, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut job = Self::lock_job(&mut tx, id).await?;

        let transition = job.finish(outcome, chrono::Utc::now());
        if transition == Transition::Applied {
            sqlx::query(
                "UPDATE generation_jobs \
                 SET status = $2, output = $3, failure_reason = $4, \
                     finished_at = $5, updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(id.as_str())
            .bind(job.status.as_str())
            .bind(&job.output)
            .bind(&job.failure_reason)
            .bind(job.finished_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(transition)
    }

    async fn list_by_owner(
        &self,
        owner: &str,
        query: &JobListQuery,
    ) -> Result<Vec<Job>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(owner)
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
