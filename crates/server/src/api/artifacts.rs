//! Read endpoints for the shared result artifacts.

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use docket_core::{ArtifactError, ArtifactKind};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

use crate::state::AppState;

/// Parsed artifact with where it came from
#[derive(Debug, Serialize)]
pub struct ArtifactResponse {
    pub message: String,
    pub file_path: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ArtifactErrorResponse {
    pub error: String,
}

fn error_response(e: ArtifactError) -> (StatusCode, Json<ArtifactErrorResponse>) {
    let status = match &e {
        ArtifactError::NotFound(_) => StatusCode::NOT_FOUND,
        ArtifactError::Io { .. } | ArtifactError::Json { .. } => {
            error!(error = %e, "Failed to read artifact");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ArtifactErrorResponse {
            error: e.to_string(),
        }),
    )
}

async fn read_artifact(
    state: &AppState,
    kind: ArtifactKind,
) -> Result<Json<ArtifactResponse>, (StatusCode, Json<ArtifactErrorResponse>)> {
    let stored = state.artifacts().read_json(kind).await.map_err(error_response)?;
    Ok(Json(ArtifactResponse {
        message: format!("{} retrieved successfully", kind),
        file_path: stored.path.display().to_string(),
        timestamp: Utc::now(),
        data: stored.data,
    }))
}

async fn download_artifact(
    state: &AppState,
    kind: ArtifactKind,
) -> Result<Response, (StatusCode, Json<ArtifactErrorResponse>)> {
    let raw = state.artifacts().read_raw(kind).await.map_err(error_response)?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", raw.file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        raw.bytes,
    )
        .into_response())
}

/// Latest scraping metadata, parsed
pub async fn scraping_metadata(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ArtifactResponse>, impl IntoResponse> {
    read_artifact(&state, ArtifactKind::ScrapingMetadata).await
}

/// Latest analysis results, parsed
pub async fn analysis_results(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ArtifactResponse>, impl IntoResponse> {
    read_artifact(&state, ArtifactKind::AnalysisResults).await
}

/// Latest scraping metadata as a file download
pub async fn download_scraping_metadata(
    State(state): State<Arc<AppState>>,
) -> Result<Response, impl IntoResponse> {
    download_artifact(&state, ArtifactKind::ScrapingMetadata).await
}

/// Latest analysis results as a file download
pub async fn download_analysis_results(
    State(state): State<Arc<AppState>>,
) -> Result<Response, impl IntoResponse> {
    download_artifact(&state, ArtifactKind::AnalysisResults).await
}
