//! Provider webhook intake.
//!
//! Providers retry on anything but a 2xx, so a callback that can never be
//! applied (unknown job, unknown component, progress ping) is acknowledged
//! as `ignored`. Only store unavailability asks the provider to retry.

use adgen_core::component::{ComponentCallback, ComponentKind};
use adgen_core::error::CoreError;
use adgen_core::types::JobId;
use adgen_providers::CallbackPayload;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CallbackAck {
    pub acknowledged: bool,
    pub outcome: &'static str,
}

const IGNORED: &str = "ignored";

fn ack(outcome: &'static str) -> Json<DataResponse<CallbackAck>> {
    Json(DataResponse {
        data: CallbackAck {
            acknowledged: true,
            outcome,
        },
    })
}

/// POST /api/v1/callbacks/{job_id}/{component}
pub async fn receive_callback(
    State(state): State<AppState>,
    Path((job_id, component)): Path<(String, String)>,
    payload: Result<Json<CallbackPayload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let job_id = JobId::from(job_id);

    let component: ComponentKind = match component.parse() {
        Ok(c) => c,
        Err(_) => {
            tracing::warn!(%job_id, %component, "Callback for unknown component ignored");
            return Ok(ack(IGNORED));
        }
    };

    let Some(outcome) = payload.into_outcome() else {
        tracing::debug!(%job_id, %component, "Progress callback ignored");
        return Ok(ack(IGNORED));
    };

    let callback = ComponentCallback {
        job_id: job_id.clone(),
        component,
        outcome,
    };
    match state.reconciler.handle(callback).await {
        Ok(outcome) => Ok(ack(outcome.as_str())),
        Err(CoreError::NotFound { entity, id }) => {
            tracing::warn!(%job_id, %component, entity, %id, "Callback target not found, ignored");
            Ok(ack(IGNORED))
        }
        Err(e) => Err(e.into()),
    }
}
