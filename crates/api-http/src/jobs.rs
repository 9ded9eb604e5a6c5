use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::debug;
use tracklab_core::domain::{DomainError, Job, JobProgress, JobStatus};
use tracklab_core::AppError;

use crate::error::ApiError;
use crate::state::AppState;

pub const OWNER_HEADER: &str = "x-owner-id";

/// Identity comes from the `x-owner-id` header, authenticated upstream
pub(crate) fn require_owner(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", OWNER_HEADER)))
}

/// Load a job and enforce that it belongs to the caller. An ownership
/// mismatch is reported as 403, never as 404, so an owner probing a real
/// id learns that it exists but not whose it is.
pub(crate) async fn load_owned_job(
    state: &AppState,
    job_id: &str,
    owner_id: &str,
) -> Result<Job, ApiError> {
    let job = state
        .store
        .get_job(&job_id.to_string())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {} not found", job_id)))?;

    if job.owner_id != owner_id {
        return Err(AppError::from(DomainError::OwnershipMismatch {
            job_id: job.id.clone(),
            owner_id: owner_id.to_string(),
        })
        .into());
    }
    Ok(job)
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub kind: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            kind: job.kind.as_str().to_string(),
            status: job.status,
            progress: job.progress,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// GET /jobs/{id} - job snapshot
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<JobResponse>, ApiError> {
    let owner_id = require_owner(&headers)?;
    debug!(job_id = %job_id, owner_id = %owner_id, "Job snapshot requested");

    let job = load_owned_job(&state, &job_id, &owner_id).await?;
    Ok(Json(job.into()))
}
