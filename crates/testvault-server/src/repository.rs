//! Owner-scoped persistence for test artifacts.
//!
//! Every lookup and mutation is keyed on `(id, owner)`, so an artifact owned
//! by someone else is indistinguishable from one that does not exist.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use testvault_core::{ArtifactError, NewTestArtifact, NewVersion, TestArtifact};
use uuid::Uuid;

pub use memory::MemoryArtifactRepository;
pub use postgres::PgArtifactRepository;

/// Typed repository failure.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Test artifact not found")]
    NotFound,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid version index {index} (artifact has {len} versions)")]
    InvalidVersionIndex { index: usize, len: usize },

    /// Storage could not be reached; nothing was executed.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Stored rows violate the history invariants.
    #[error("Corrupt artifact record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                RepositoryError::Unavailable(err.to_string())
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => RepositoryError::Unavailable(err.to_string()),
            other => RepositoryError::Database(other),
        }
    }
}

impl From<ArtifactError> for RepositoryError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::InvalidInput(msg) => RepositoryError::InvalidInput(msg),
            ArtifactError::NotFound => RepositoryError::NotFound,
            ArtifactError::InvalidVersionIndex { index, len } => RepositoryError::InvalidVersionIndex {
                index: usize::try_from(index).unwrap_or(usize::MAX),
                len,
            },
            ArtifactError::StorageUnavailable(msg) => RepositoryError::Unavailable(msg),
            other => RepositoryError::Corrupt(other.to_string()),
        }
    }
}

/// Storage and retrieval of artifacts with history-preserving mutations.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// All artifacts of `owner`, most recently updated first.
    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<TestArtifact>, RepositoryError>;

    /// Artifacts of `owner` targeting `file_path`, most recently updated first.
    async fn list_by_path(
        &self,
        owner: Uuid,
        file_path: &str,
    ) -> Result<Vec<TestArtifact>, RepositoryError>;

    /// Point lookup; `NotFound` when absent or owned by someone else.
    async fn get_owned(&self, id: Uuid, owner: Uuid) -> Result<TestArtifact, RepositoryError>;

    /// Creates an artifact holding exactly one version.
    async fn create(
        &self,
        owner: Uuid,
        artifact: NewTestArtifact,
    ) -> Result<TestArtifact, RepositoryError>;

    /// Appends a version and makes it current.
    async fn append_version(
        &self,
        id: Uuid,
        owner: Uuid,
        version: NewVersion,
    ) -> Result<TestArtifact, RepositoryError>;

    /// Appends a copy of `versions[version_index]`, validated against the
    /// history length observed inside the same atomic operation.
    async fn restore_version(
        &self,
        id: Uuid,
        owner: Uuid,
        version_index: usize,
    ) -> Result<TestArtifact, RepositoryError>;

    /// Deletes the artifact and its whole history.
    async fn remove(&self, id: Uuid, owner: Uuid) -> Result<(), RepositoryError>;
}
