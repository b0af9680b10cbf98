//! Graph export handler

use super::checked_login;
use super::profiles::{accepted, failed};
use crate::jobs::JobStatus;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use skillgraph_common::errors::{AppError, Result};

/// Node/link export from the latest completed run
pub async fn get_graph(
    State(state): State<AppState>,
    Path(login): Path<String>,
) -> Result<Response> {
    let login = checked_login(login)?;
    let job = state
        .jobs
        .latest(&login)
        .await
        .ok_or_else(|| AppError::ProfileNotFound {
            developer: login.clone(),
        })?;

    match job.status {
        JobStatus::Processing => Ok(accepted(&job)),
        JobStatus::Failed => Ok(failed(&job)),
        JobStatus::Cancelled => Err(AppError::Cancelled),
        JobStatus::Completed => {
            let run = job.run.ok_or_else(|| AppError::Internal {
                message: "completed job without a result".to_string(),
            })?;
            Ok(Json(&run.graph).into_response())
        }
    }
}
