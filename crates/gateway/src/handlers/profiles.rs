//! Profile handlers
//!
//! Runs are asynchronous: starting one answers `202 Accepted` with a job
//! id, and the profile is served once the latest run for the login has
//! completed.

use super::checked_login;
use crate::jobs::{JobStatus, JobView};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use skillgraph_common::errors::{AppError, ErrorCode, ErrorDetails, ErrorResponse, Result};
use skillgraph_ingestion::ActivitySnapshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use validator::Validate;

/// Optional body of a run request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileRequest {
    /// Pre-collected activity; fetched from the configured source when absent
    #[serde(default)]
    pub snapshot: Option<ActivitySnapshot>,

    /// Skill hypotheses to search; all skills in the graph when absent
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub skills: Option<Vec<String>>,
}

/// Response after starting a run
#[derive(Serialize)]
pub struct RunAccepted {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
    pub poll_url: String,
}

impl RunAccepted {
    fn from_job(job: &JobView) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            message: job.message.clone(),
            poll_url: format!("/v2/profiles/{}", job.login),
        }
    }
}

/// `202` with the job while a run is in flight
pub(crate) fn accepted(job: &JobView) -> Response {
    (StatusCode::ACCEPTED, Json(RunAccepted::from_job(job))).into_response()
}

/// `500` carrying the failure of the latest run
pub(crate) fn failed(job: &JobView) -> Response {
    let (code, message) = match &job.failure {
        Some(failure) => (failure.code, failure.message.clone()),
        None => (ErrorCode::InternalError, job.message.clone()),
    };
    let body = ErrorResponse {
        error: ErrorDetails {
            code,
            message,
            details: Some(serde_json::json!({ "job_id": job.job_id })),
        },
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Register a run and execute it in the background
pub(crate) async fn start_run(state: &AppState, login: &str, request: ProfileRequest) -> JobView {
    let (job, cancel) = state.jobs.begin(login).await;
    tracing::info!(job_id = %job.job_id, login, "Inference run accepted");

    let task_state = state.clone();
    let job_id = job.job_id;
    let login = login.to_string();
    tokio::spawn(async move {
        let result = execute(&task_state, &login, request, cancel).await;
        if let Err(e) = &result {
            tracing::warn!(job_id = %job_id, error = %e, "Inference run did not complete");
        }
        task_state.jobs.finish(job_id, result).await;
    });

    job
}

async fn execute(
    state: &AppState,
    login: &str,
    request: ProfileRequest,
    cancel: CancellationToken,
) -> Result<skillgraph_search::InferenceRun> {
    let snapshot = match request.snapshot {
        Some(snapshot) => snapshot,
        None => tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            fetched = state.source.fetch(login) => fetched?,
        },
    };
    state
        .engine
        .infer(login, &snapshot, request.skills.as_deref(), cancel)
        .await
}

/// Start (or supersede) a run for a developer
pub async fn start_profile(
    State(state): State<AppState>,
    Path(login): Path<String>,
    body: Bytes,
) -> Result<Response> {
    let login = checked_login(login)?;

    let request: ProfileRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ProfileRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::InvalidFormat {
            message: format!("Invalid profile request: {}", e),
        })?
    };
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("skills".to_string()),
    })?;

    let job = start_run(&state, &login, request).await;
    Ok(accepted(&job))
}

/// Get the profile of the latest completed run
pub async fn get_profile(
    State(state): State<AppState>,
    Path(login): Path<String>,
) -> Result<Response> {
    let login = checked_login(login)?;

    let Some(job) = state.jobs.latest(&login).await else {
        let job = start_run(&state, &login, ProfileRequest::default()).await;
        return Ok(accepted(&job));
    };

    match job.status {
        JobStatus::Processing => Ok(accepted(&job)),
        JobStatus::Failed => Ok(failed(&job)),
        JobStatus::Cancelled => Err(AppError::Cancelled),
        JobStatus::Completed => {
            let run = job.run.ok_or_else(|| AppError::Internal {
                message: "completed job without a result".to_string(),
            })?;
            Ok(Json(&run.profile).into_response())
        }
    }
}

/// Cancel the in-flight run of a developer
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(login): Path<String>,
) -> Result<StatusCode> {
    let login = checked_login(login)?;
    if state.jobs.cancel(&login).await {
        tracing::info!(login = %login, "Inference run cancellation requested");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound {
            resource_type: "run".to_string(),
            id: login,
        })
    }
}
