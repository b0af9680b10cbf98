//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use skillgraph_common::VERSION;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: ReadyChecks,
}

#[derive(Serialize)]
pub struct ReadyChecks {
    pub oracle: String,
    pub source: String,
    pub skills: usize,
}

/// Liveness check: always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
    })
}

/// Readiness check: reports the wired providers
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let skills = state.config.skills.len();
    Json(ReadyResponse {
        status: if skills > 0 { "ready" } else { "not_ready" }.to_string(),
        checks: ReadyChecks {
            oracle: state.oracle.name().to_string(),
            source: state.source.name().to_string(),
            skills,
        },
    })
}
