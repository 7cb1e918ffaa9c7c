//! API routes for the TestVault server.

pub mod artifacts;
pub mod generate;

use std::sync::Arc;

use axum::extract::{FromRef, FromRequest};
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::auth::JwtVerifier;
use crate::error::AppError;
use crate::service::ArtifactService;

/// Shared handler state.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub service: Arc<ArtifactService>,
    pub verifier: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(service: ArtifactService, verifier: JwtVerifier) -> Self {
        Self {
            service: Arc::new(service),
            verifier: Arc::new(verifier),
        }
    }
}

/// JSON body extractor whose rejections render as `400 { "error": ... }`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Creates the main API router with all routes mounted.
pub fn create_router(state: AppState) -> Router {
    Router::new().nest("/api/v1", api_v1_routes(state))
}

/// Creates the v1 API routes.
fn api_v1_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/artifacts", artifacts::router(state.clone()))
        .nest("/generate", generate::router(state))
}

/// GET /api/v1/health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Whether `origin` is a local development origin (`http://localhost:<port>`
/// or `http://127.0.0.1:<port>`).
pub fn is_local_origin(origin: &str) -> bool {
    let Some(rest) = origin
        .strip_prefix("http://localhost:")
        .or_else(|| origin.strip_prefix("http://127.0.0.1:"))
    else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

/// CORS policy: credentialed requests from local development origins, or
/// no cross-origin access at all.
pub fn cors_layer(allow_localhost: bool) -> CorsLayer {
    if !allow_localhost {
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin.to_str().map(is_local_origin).unwrap_or(false)
        }))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
