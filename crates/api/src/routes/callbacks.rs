use axum::routing::post;
use axum::Router;

use crate::handlers::callbacks;
use crate::state::AppState;

/// Routes mounted at `/callbacks`.
///
/// ```text
/// POST   /{job_id}/{component}   -> receive_callback
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{job_id}/{component}", post(callbacks::receive_callback))
}
