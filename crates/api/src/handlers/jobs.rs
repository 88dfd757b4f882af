//! Handlers for the `/jobs` resource and owner listings.

use adgen_core::types::JobId;
use adgen_db::{JobListQuery, JobStore};
use adgen_pipeline::CreateJobRequest;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobCreated {
    pub job_id: JobId,
}

/// POST /api/v1/jobs
///
/// Persist a new `running` job and return its id. Generation is started in
/// the background; dispatch failures never surface here.
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(request) = payload?;
    let submitted = state.intake.submit(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: JobCreated {
                job_id: submitted.job.id,
            },
        }),
    ))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.store.get(&JobId::from(id)).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/cancel
///
/// 204 on success, 409 if the job is already terminal.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.reconciler.cancel(&JobId::from(id)).await?;
    tracing::info!(job_id = %job.id, owner = %job.owner, "Job canceled");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/{owner_id}/jobs
///
/// Newest first; `limit` (default 50, max 100) and `offset` query params.
pub async fn list_owner_jobs(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    params: Result<Query<JobListQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params?;
    let jobs = state.store.list_by_owner(&owner_id, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}
