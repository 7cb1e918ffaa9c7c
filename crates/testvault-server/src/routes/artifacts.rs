//! Test artifact endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use testvault_core::{ArtifactError, NewTestArtifact, NewVersion, TestArtifact};
use uuid::Uuid;

use super::{AppJson, AppState};
use crate::auth::Principal;
use crate::error::AppError;
use crate::generation::CodeRequest;
use crate::service::ArtifactService;

/// Query parameters for listing artifacts.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListArtifactsQuery {
    /// Only return artifacts targeting this file.
    pub file_path: Option<String>,
}

/// Request body for saving a new artifact.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArtifactRequest {
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Request body for appending a version.
#[derive(Debug, Deserialize)]
pub struct AppendVersionRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Request body for restoring a version.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreVersionRequest {
    pub version_index: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ArtifactListResponse {
    pub artifacts: Vec<TestArtifact>,
}

#[derive(Debug, Serialize)]
pub struct ArtifactResponse {
    pub artifact: TestArtifact,
}

#[derive(Debug, Serialize)]
pub struct DeleteArtifactResponse {
    pub ok: bool,
}

/// Creates the artifacts router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_artifacts).post(create_artifact))
        .route("/generate", post(generate_artifact))
        .route(
            "/{id}",
            get(get_artifact).put(append_version).delete(delete_artifact),
        )
        .route("/{id}/restore", post(restore_version))
        .with_state(state)
}

/// Parses an artifact id path segment. A malformed id cannot name an
/// artifact, so it is reported exactly like a missing one.
fn parse_artifact_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Artifact(ArtifactError::NotFound))
}

/// GET /api/v1/artifacts
///
/// Lists the caller's artifacts, most recently updated first. With
/// `?filePath=...` only artifacts for that file are returned.
async fn list_artifacts(
    State(service): State<Arc<ArtifactService>>,
    principal: Principal,
    Query(query): Query<ListArtifactsQuery>,
) -> Result<Json<ArtifactListResponse>, AppError> {
    let artifacts = match query.file_path {
        Some(file_path) => service.list_for_path(&principal, &file_path).await?,
        None => service.list(&principal).await?,
    };
    Ok(Json(ArtifactListResponse { artifacts }))
}

/// GET /api/v1/artifacts/{id}
async fn get_artifact(
    State(service): State<Arc<ArtifactService>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<ArtifactResponse>, AppError> {
    let id = parse_artifact_id(&id)?;
    let artifact = service.get(&principal, id).await?;
    Ok(Json(ArtifactResponse { artifact }))
}

/// POST /api/v1/artifacts
///
/// Saves a new artifact with a single version.
async fn create_artifact(
    State(service): State<Arc<ArtifactService>>,
    principal: Principal,
    AppJson(req): AppJson<CreateArtifactRequest>,
) -> Result<Json<ArtifactResponse>, AppError> {
    let artifact = service
        .create(
            &principal,
            NewTestArtifact {
                file_path: req.file_path,
                framework: req.framework,
                code: req.code,
                summary: req.summary,
            },
        )
        .await?;
    Ok(Json(ArtifactResponse { artifact }))
}

/// PUT /api/v1/artifacts/{id}
///
/// Appends a new version; earlier versions are kept unchanged.
async fn append_version(
    State(service): State<Arc<ArtifactService>>,
    principal: Principal,
    Path(id): Path<String>,
    AppJson(req): AppJson<AppendVersionRequest>,
) -> Result<Json<ArtifactResponse>, AppError> {
    let id = parse_artifact_id(&id)?;
    let artifact = service
        .append_version(
            &principal,
            id,
            NewVersion {
                code: req.code,
                summary: req.summary,
            },
        )
        .await?;
    Ok(Json(ArtifactResponse { artifact }))
}

/// POST /api/v1/artifacts/{id}/restore
///
/// Appends a copy of `versions[versionIndex]` as the new current version.
async fn restore_version(
    State(service): State<Arc<ArtifactService>>,
    principal: Principal,
    Path(id): Path<String>,
    AppJson(req): AppJson<RestoreVersionRequest>,
) -> Result<Json<ArtifactResponse>, AppError> {
    let id = parse_artifact_id(&id)?;
    let version_index = req
        .version_index
        .ok_or_else(|| ArtifactError::InvalidInput("versionIndex is required".to_string()))?;
    let artifact = service.restore_version(&principal, id, version_index).await?;
    Ok(Json(ArtifactResponse { artifact }))
}

/// DELETE /api/v1/artifacts/{id}
async fn delete_artifact(
    State(service): State<Arc<ArtifactService>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<DeleteArtifactResponse>, AppError> {
    let id = parse_artifact_id(&id)?;
    service.remove(&principal, id).await?;
    Ok(Json(DeleteArtifactResponse { ok: true }))
}

/// POST /api/v1/artifacts/generate
///
/// Generates test code for a file and saves it as a new artifact. A
/// generation failure leaves storage untouched.
async fn generate_artifact(
    State(service): State<Arc<ArtifactService>>,
    principal: Principal,
    AppJson(req): AppJson<CodeRequest>,
) -> Result<Json<ArtifactResponse>, AppError> {
    let artifact = service.generate_and_save(&principal, req).await?;
    Ok(Json(ArtifactResponse { artifact }))
}
