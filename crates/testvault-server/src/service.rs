//! Artifact service: request validation, repository orchestration and
//! error mapping.
//!
//! Every operation takes the caller's [`Principal`]; there is no way to reach
//! the repository without an identity. Repository failures are mapped onto
//! [`ArtifactError`] here and storage details are logged, never returned.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use testvault_core::{
    validate_code, validate_file_path, ArtifactError, NewTestArtifact, NewVersion, TestArtifact,
};
use uuid::Uuid;

use crate::auth::Principal;
use crate::generation::{
    BatchFile, BatchResult, CodeRequest, FileSummaries, GeneratedTest, SourceFile, TestGenerator,
};
use crate::repository::{ArtifactRepository, RepositoryError};

/// Upper bound for a single backoff sleep.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Backoff schedule for reads that hit unavailable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep before attempt `attempt + 1`; doubles each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

pub struct ArtifactService {
    repo: Arc<dyn ArtifactRepository>,
    generator: Arc<dyn TestGenerator>,
    retry: RetryPolicy,
}

impl ArtifactService {
    pub fn new(repo: Arc<dyn ArtifactRepository>, generator: Arc<dyn TestGenerator>) -> Self {
        Self {
            repo,
            generator,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// All artifacts of the caller, most recently updated first.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<TestArtifact>, ArtifactError> {
        self.read("list", || self.repo.list_by_owner(principal.user_id))
            .await
    }

    /// The caller's artifacts for one file path.
    ///
    /// Lets a client decide between creating a new artifact and appending to
    /// an existing one; path uniqueness is not enforced.
    pub async fn list_for_path(
        &self,
        principal: &Principal,
        file_path: &str,
    ) -> Result<Vec<TestArtifact>, ArtifactError> {
        validate_file_path(file_path)?;
        self.read("list_for_path", || {
            self.repo.list_by_path(principal.user_id, file_path)
        })
        .await
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<TestArtifact, ArtifactError> {
        self.read("get", || self.repo.get_owned(id, principal.user_id))
            .await
    }

    pub async fn create(
        &self,
        principal: &Principal,
        artifact: NewTestArtifact,
    ) -> Result<TestArtifact, ArtifactError> {
        artifact.validate()?;
        let created = self
            .repo
            .create(principal.user_id, artifact)
            .await
            .map_err(|e| storage_error("create", e))?;

        tracing::info!(
            artifact_id = %created.id,
            owner = %principal.user_id,
            file_path = %created.file_path,
            framework = %created.framework,
            "Test artifact created"
        );
        Ok(created)
    }

    pub async fn append_version(
        &self,
        principal: &Principal,
        id: Uuid,
        version: NewVersion,
    ) -> Result<TestArtifact, ArtifactError> {
        validate_code(&version.code)?;
        let updated = self
            .repo
            .append_version(id, principal.user_id, version)
            .await
            .map_err(|e| storage_error("append_version", e))?;

        tracing::info!(
            artifact_id = %id,
            owner = %principal.user_id,
            versions = updated.version_count(),
            "Test artifact version appended"
        );
        Ok(updated)
    }

    /// Appends a copy of `versions[version_index]` as the current version.
    pub async fn restore_version(
        &self,
        principal: &Principal,
        id: Uuid,
        version_index: i64,
    ) -> Result<TestArtifact, ArtifactError> {
        let Ok(index) = usize::try_from(version_index) else {
            // Ownership is still checked first so a foreign id stays NotFound.
            let artifact = self.get(principal, id).await?;
            return Err(ArtifactError::InvalidVersionIndex {
                index: version_index,
                len: artifact.version_count(),
            });
        };

        let restored = self
            .repo
            .restore_version(id, principal.user_id, index)
            .await
            .map_err(|e| storage_error("restore_version", e))?;

        tracing::info!(
            artifact_id = %id,
            owner = %principal.user_id,
            restored_index = index,
            versions = restored.version_count(),
            "Test artifact version restored"
        );
        Ok(restored)
    }

    pub async fn remove(&self, principal: &Principal, id: Uuid) -> Result<(), ArtifactError> {
        self.repo
            .remove(id, principal.user_id)
            .await
            .map_err(|e| storage_error("remove", e))?;

        tracing::info!(artifact_id = %id, owner = %principal.user_id, "Test artifact deleted");
        Ok(())
    }

    /// Saves a generation result as a new artifact.
    pub async fn create_from_generation(
        &self,
        principal: &Principal,
        file_path: String,
        framework: Option<String>,
        generated: GeneratedTest,
    ) -> Result<TestArtifact, ArtifactError> {
        if generated.code.trim().is_empty() {
            return Err(ArtifactError::GenerationFailed(
                "generator returned empty test code".to_string(),
            ));
        }
        self.create(
            principal,
            NewTestArtifact {
                file_path,
                framework,
                code: generated.code,
                summary: generated.summary,
            },
        )
        .await
    }

    /// Generates test code and saves it as a new artifact.
    ///
    /// Nothing is written unless generation succeeds.
    pub async fn generate_and_save(
        &self,
        principal: &Principal,
        request: CodeRequest,
    ) -> Result<TestArtifact, ArtifactError> {
        let code = self.generate_code(principal, &request).await?;
        let summary = Some(request.summary).filter(|s| !s.trim().is_empty());
        self.create_from_generation(
            principal,
            request.file_path,
            request.framework,
            GeneratedTest { code, summary },
        )
        .await
    }

    pub async fn generate_code(
        &self,
        principal: &Principal,
        request: &CodeRequest,
    ) -> Result<String, ArtifactError> {
        validate_file_path(&request.file_path)?;

        let code = self.generator.test_code(request).await.map_err(|e| {
            tracing::warn!(
                owner = %principal.user_id,
                file_path = %request.file_path,
                error = %e,
                "Test code generation failed"
            );
            ArtifactError::GenerationFailed(e.to_string())
        })?;

        if code.trim().is_empty() {
            return Err(ArtifactError::GenerationFailed(
                "generator returned empty test code".to_string(),
            ));
        }
        Ok(code)
    }

    /// Generates test code for several files. A failure for one file is
    /// reported in its result and does not stop the others; nothing is saved.
    pub async fn generate_batch(
        &self,
        principal: &Principal,
        files: Vec<BatchFile>,
        framework: Option<String>,
    ) -> Result<Vec<BatchResult>, ArtifactError> {
        if files.is_empty() {
            return Err(ArtifactError::InvalidInput(
                "Non-empty files[] required".to_string(),
            ));
        }

        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let request = CodeRequest {
                file_path: file.path,
                file_content: file.content,
                framework: framework.clone(),
                summary: file.summary,
            };
            let (code, error) = match self.generate_code(principal, &request).await {
                Ok(code) => (Some(code), None),
                Err(e) => (None, Some(e.to_string())),
            };
            results.push(BatchResult {
                path: request.file_path,
                code,
                error,
            });
        }

        tracing::info!(
            owner = %principal.user_id,
            files = results.len(),
            failed = results.iter().filter(|r| r.error.is_some()).count(),
            "Batch test generation finished"
        );
        Ok(results)
    }

    pub async fn summarize_files(
        &self,
        principal: &Principal,
        files: &[SourceFile],
    ) -> Result<Vec<FileSummaries>, ArtifactError> {
        for file in files {
            validate_file_path(&file.path)?;
        }

        self.generator.summaries(files).await.map_err(|e| {
            tracing::warn!(
                owner = %principal.user_id,
                files = files.len(),
                error = %e,
                "Summary generation failed"
            );
            ArtifactError::GenerationFailed(e.to_string())
        })
    }

    /// Runs a read, retrying while storage reports itself unavailable.
    async fn read<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, ArtifactError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(RepositoryError::Unavailable(reason)) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Storage unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(storage_error(operation, err)),
            }
        }
    }
}

/// Maps a repository failure onto the public taxonomy.
fn storage_error(operation: &'static str, err: RepositoryError) -> ArtifactError {
    match err {
        RepositoryError::NotFound => ArtifactError::NotFound,
        RepositoryError::InvalidInput(msg) => ArtifactError::InvalidInput(msg),
        RepositoryError::InvalidVersionIndex { index, len } => ArtifactError::InvalidVersionIndex {
            index: i64::try_from(index).unwrap_or(i64::MAX),
            len,
        },
        RepositoryError::Unavailable(reason) => {
            tracing::error!(operation, reason = %reason, "Storage unavailable");
            ArtifactError::StorageUnavailable("storage is temporarily unavailable".to_string())
        }
        RepositoryError::Database(e) => {
            tracing::error!(operation, error = %e, "Database error");
            ArtifactError::StorageUnavailable("storage operation failed".to_string())
        }
        RepositoryError::Corrupt(detail) => {
            tracing::error!(operation, detail = %detail, "Corrupt artifact record");
            ArtifactError::StorageUnavailable("storage operation failed".to_string())
        }
    }
}
