//! Job status handlers

use crate::jobs::JobView;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use skillgraph_common::errors::{AppError, Result};
use uuid::Uuid;

/// Get job status
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>> {
    let job = state
        .jobs
        .get(job_id)
        .await
        .ok_or_else(|| AppError::JobNotFound {
            id: job_id.to_string(),
        })?;
    Ok(Json(job))
}
