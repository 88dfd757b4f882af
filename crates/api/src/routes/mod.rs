pub mod callbacks;
pub mod health;
pub mod jobs;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                                   create
/// /jobs/{id}                              get
/// /jobs/{id}/cancel                       cancel (POST)
///
/// /users/{owner_id}/jobs                  owner listing
///
/// /callbacks/{job_id}/{component}         provider webhook (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/users", users::router())
        .nest("/callbacks", callbacks::router())
}
