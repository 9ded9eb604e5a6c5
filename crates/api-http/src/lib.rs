// HTTP API for job inspection and progress streaming
//
// Two read-side endpoints over the core services:
// - GET /jobs/{id}          job snapshot (ownership-checked)
// - GET /jobs/{id}/events   SSE progress stream

pub mod error;
pub mod jobs;
pub mod sse;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs/:id", get(jobs::get_job))
        .route("/jobs/:id/events", get(sse::job_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
