//! Error taxonomy for test artifact operations.

use thiserror::Error;

/// Outcome of a failed artifact operation.
///
/// Every failure path surfaces one of these variants; storage or transport
/// specific errors are folded into `StorageUnavailable` before reaching callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    /// A required field (`filePath`, `code`) was missing or empty.
    #[error("{0}")]
    InvalidInput(String),

    /// The artifact does not exist or belongs to someone else.
    #[error("Test artifact not found")]
    NotFound,

    /// Restore target outside `0..len` of the current version list.
    #[error("Invalid version index {index} (artifact has {len} versions)")]
    InvalidVersionIndex { index: i64, len: usize },

    /// No authenticated identity was attached to the request.
    #[error("Authentication required")]
    Unauthorized,

    /// Transient persistence failure.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The test generation backend failed or produced nothing usable.
    #[error("Test generation failed: {0}")]
    GenerationFailed(String),
}

impl ArtifactError {
    /// Whether a caller may retry the operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ArtifactError::StorageUnavailable(_))
    }
}
