use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use futures::StreamExt;
use std::convert::Infallible;
use tracing::{info, warn};
use tracklab_core::application::stream::{self, StreamFrame};

use crate::error::ApiError;
use crate::jobs::{load_owned_job, require_owner};
use crate::state::AppState;

/// GET /jobs/{id}/events - SSE progress stream
///
/// Emits `data: <json>` frames for progress events and comment lines as
/// keep-alives. The stream closes itself once the job reaches a terminal
/// status; a job already terminal yields its snapshot and closes.
pub async fn job_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let owner_id = require_owner(&headers)?;
    load_owned_job(&state, &job_id, &owner_id).await?;

    info!(job_id = %job_id, owner_id = %owner_id, "SSE client connected");

    let frames = stream::open(
        state.store.clone(),
        state.bus.clone(),
        job_id,
        state.stream_config,
    )
    .await
    .map_err(ApiError::from)?;

    let events = frames.filter_map(|frame| async move {
        match frame {
            StreamFrame::Event(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().data(json))),
                Err(e) => {
                    warn!("Failed to serialize progress event: {}", e);
                    None
                }
            },
            StreamFrame::KeepAlive => Some(Ok(Event::default().comment("keep-alive"))),
        }
    });

    Ok(Sse::new(events))
}
