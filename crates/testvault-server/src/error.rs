//! Error types for the TestVault server.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use testvault_core::ArtifactError;

/// Seconds clients are asked to wait after a transient storage failure.
const STORAGE_RETRY_AFTER_SECS: u64 = 1;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Artifact(err) => match err {
                ArtifactError::InvalidInput(_) | ArtifactError::InvalidVersionIndex { .. } => {
                    StatusCode::BAD_REQUEST
                }
                ArtifactError::NotFound => StatusCode::NOT_FOUND,
                ArtifactError::Unauthorized => StatusCode::UNAUTHORIZED,
                ArtifactError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ArtifactError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        let retryable = matches!(&self, AppError::Artifact(e) if e.is_retryable());
        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if retryable {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(STORAGE_RETRY_AFTER_SECS),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_status_codes() {
        let cases = [
            (ArtifactError::InvalidInput("code is required".into()), StatusCode::BAD_REQUEST),
            (
                ArtifactError::InvalidVersionIndex { index: 5, len: 2 },
                StatusCode::BAD_REQUEST,
            ),
            (ArtifactError::NotFound, StatusCode::NOT_FOUND),
            (ArtifactError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                ArtifactError::StorageUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ArtifactError::GenerationFailed("boom".into()), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_storage_unavailable_sets_retry_after() {
        let response =
            AppError::from(ArtifactError::StorageUnavailable("down".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "1");
    }

    #[tokio::test]
    async fn test_bad_request_body_and_headers() {
        let response = AppError::BadRequest("expected value at line 1".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Invalid request: expected value at line 1");
    }
}
