//! Test generation endpoints.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use super::{AppJson, AppState};
use crate::auth::Principal;
use crate::error::AppError;
use crate::generation::{BatchFile, BatchResult, CodeRequest, FileSummaries, SourceFile};
use crate::service::ArtifactService;

/// Request body for summarizing files.
#[derive(Debug, Deserialize)]
pub struct SummariesRequest {
    #[serde(default)]
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Serialize)]
pub struct SummariesResponse {
    pub files: Vec<FileSummaries>,
}

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub code: String,
}

/// Request body for generating tests for several files at once.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub files: Vec<BatchFile>,
    #[serde(default)]
    pub framework: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchResult>,
}

/// Creates the generation router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/summaries", post(generate_summaries))
        .route("/code", post(generate_code))
        .route("/tests", post(generate_tests))
        .with_state(state)
}

/// POST /api/v1/generate/summaries
async fn generate_summaries(
    State(service): State<Arc<ArtifactService>>,
    principal: Principal,
    AppJson(req): AppJson<SummariesRequest>,
) -> Result<Json<SummariesResponse>, AppError> {
    let files = service.summarize_files(&principal, &req.files).await?;
    Ok(Json(SummariesResponse { files }))
}

/// POST /api/v1/generate/code
///
/// Returns generated code without saving it.
async fn generate_code(
    State(service): State<Arc<ArtifactService>>,
    principal: Principal,
    AppJson(req): AppJson<CodeRequest>,
) -> Result<Json<CodeResponse>, AppError> {
    let code = service.generate_code(&principal, &req).await?;
    Ok(Json(CodeResponse { code }))
}

/// POST /api/v1/generate/tests
///
/// Generates code for each file in `files`; per-file failures are returned
/// in that file's result. Nothing is saved.
async fn generate_tests(
    State(service): State<Arc<ArtifactService>>,
    principal: Principal,
    AppJson(req): AppJson<BatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let results = service
        .generate_batch(&principal, req.files, req.framework)
        .await?;
    Ok(Json(BatchResponse { results }))
}
