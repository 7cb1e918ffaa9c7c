//! In-process artifact repository.
//!
//! Mutations run under a single write lock, so every read-modify-write of a
//! version list is atomic and concurrent appends are never lost.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use testvault_core::{validate_file_path, NewTestArtifact, NewVersion, TestArtifact};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ArtifactRepository, RepositoryError};

#[derive(Debug, Default)]
pub struct MemoryArtifactRepository {
    artifacts: RwLock<HashMap<Uuid, TestArtifact>>,
}

impl MemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn select(
        &self,
        owner: Uuid,
        filter: impl Fn(&TestArtifact) -> bool,
    ) -> Vec<TestArtifact> {
        let artifacts = self.artifacts.read().await;
        let mut owned: Vec<TestArtifact> = artifacts
            .values()
            .filter(|a| a.is_owned_by(owner) && filter(a))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        owned
    }

    async fn mutate(
        &self,
        id: Uuid,
        owner: Uuid,
        f: impl FnOnce(&mut TestArtifact) -> Result<(), RepositoryError>,
    ) -> Result<TestArtifact, RepositoryError> {
        let mut artifacts = self.artifacts.write().await;
        let artifact = artifacts
            .get_mut(&id)
            .filter(|a| a.is_owned_by(owner))
            .ok_or(RepositoryError::NotFound)?;
        f(artifact)?;
        Ok(artifact.clone())
    }
}

#[async_trait]
impl ArtifactRepository for MemoryArtifactRepository {
    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<TestArtifact>, RepositoryError> {
        Ok(self.select(owner, |_| true).await)
    }

    async fn list_by_path(
        &self,
        owner: Uuid,
        file_path: &str,
    ) -> Result<Vec<TestArtifact>, RepositoryError> {
        validate_file_path(file_path)?;
        Ok(self.select(owner, |a| a.file_path == file_path).await)
    }

    async fn get_owned(&self, id: Uuid, owner: Uuid) -> Result<TestArtifact, RepositoryError> {
        self.artifacts
            .read()
            .await
            .get(&id)
            .filter(|a| a.is_owned_by(owner))
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn create(
        &self,
        owner: Uuid,
        artifact: NewTestArtifact,
    ) -> Result<TestArtifact, RepositoryError> {
        let artifact = TestArtifact::create(Uuid::new_v4(), owner, artifact, Utc::now())?;
        self.artifacts
            .write()
            .await
            .insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    async fn append_version(
        &self,
        id: Uuid,
        owner: Uuid,
        version: NewVersion,
    ) -> Result<TestArtifact, RepositoryError> {
        version.validate()?;
        self.mutate(id, owner, |artifact| {
            artifact.push_version(version, Utc::now())?;
            Ok(())
        })
        .await
    }

    async fn restore_version(
        &self,
        id: Uuid,
        owner: Uuid,
        version_index: usize,
    ) -> Result<TestArtifact, RepositoryError> {
        self.mutate(id, owner, |artifact| {
            artifact.restore_version(version_index, Utc::now())?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, id: Uuid, owner: Uuid) -> Result<(), RepositoryError> {
        let mut artifacts = self.artifacts.write().await;
        if !artifacts.get(&id).is_some_and(|a| a.is_owned_by(owner)) {
            return Err(RepositoryError::NotFound);
        }
        artifacts.remove(&id);
        Ok(())
    }
}
