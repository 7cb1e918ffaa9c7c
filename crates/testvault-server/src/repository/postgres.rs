//! PostgreSQL artifact repository.
//!
//! Artifact headers live in `test_artifacts`, history in
//! `test_artifact_versions` keyed by `(artifact_id, position)`. Append and
//! restore lock the owner-scoped artifact row with `SELECT ... FOR UPDATE`
//! before reading the history length, so concurrent writers are serialized
//! and each lands at its own position.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use testvault_core::{next_timestamp, validate_file_path, NewTestArtifact, NewVersion, TestArtifact};
use uuid::Uuid;

use super::{ArtifactRepository, RepositoryError};
use crate::models::{group_rows, ArtifactVersionRow, VersionContentRow};

const SELECT_BY_OWNER: &str = r#"
    SELECT a.id, a.owner_id, a.file_path, a.framework, a.created_at, a.updated_at,
           v.position, v.code, v.summary, v.created_at AS version_created_at
    FROM test_artifacts a
    JOIN test_artifact_versions v ON v.artifact_id = a.id
    WHERE a.owner_id = $1
    ORDER BY a.updated_at DESC, a.id, v.position
"#;

const SELECT_BY_PATH: &str = r#"
    SELECT a.id, a.owner_id, a.file_path, a.framework, a.created_at, a.updated_at,
           v.position, v.code, v.summary, v.created_at AS version_created_at
    FROM test_artifacts a
    JOIN test_artifact_versions v ON v.artifact_id = a.id
    WHERE a.owner_id = $1 AND a.file_path = $2
    ORDER BY a.updated_at DESC, a.id, v.position
"#;

const SELECT_OWNED: &str = r#"
    SELECT a.id, a.owner_id, a.file_path, a.framework, a.created_at, a.updated_at,
           v.position, v.code, v.summary, v.created_at AS version_created_at
    FROM test_artifacts a
    JOIN test_artifact_versions v ON v.artifact_id = a.id
    WHERE a.id = $1 AND a.owner_id = $2
    ORDER BY v.position
"#;

/// Artifact row state captured under the row lock.
struct LockedArtifact {
    updated_at: DateTime<Utc>,
    version_count: usize,
}

#[derive(Debug, Clone)]
pub struct PgArtifactRepository {
    pool: PgPool,
}

impl PgArtifactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Current time at the precision `TIMESTAMPTZ` stores, so returned
/// artifacts match what later reads load.
fn db_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn into_artifacts(rows: Vec<ArtifactVersionRow>) -> Result<Vec<TestArtifact>, RepositoryError> {
    group_rows(rows).map_err(RepositoryError::Corrupt)
}

/// Loads one owned artifact with its full history.
async fn fetch_owned<'e, E>(executor: E, id: Uuid, owner: Uuid) -> Result<TestArtifact, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let rows: Vec<ArtifactVersionRow> = sqlx::query_as(SELECT_OWNED)
        .bind(id)
        .bind(owner)
        .fetch_all(executor)
        .await?;

    into_artifacts(rows)?
        .into_iter()
        .next()
        .ok_or(RepositoryError::NotFound)
}

/// Locks the `(id, owner)` artifact row for the rest of the transaction and
/// reads the history length under that lock.
async fn lock_owned(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    owner: Uuid,
) -> Result<LockedArtifact, RepositoryError> {
    let locked: Option<(DateTime<Utc>,)> = sqlx::query_as(
        "SELECT updated_at FROM test_artifacts WHERE id = $1 AND owner_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(owner)
    .fetch_optional(&mut **tx)
    .await?;

    let Some((updated_at,)) = locked else {
        return Err(RepositoryError::NotFound);
    };

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM test_artifact_versions WHERE artifact_id = $1")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;

    Ok(LockedArtifact {
        updated_at,
        version_count: usize::try_from(count)
            .map_err(|_| RepositoryError::Corrupt(format!("negative version count for {}", id)))?,
    })
}

/// Writes a version at the end of a locked artifact's history.
async fn append_locked(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    locked: &LockedArtifact,
    code: &str,
    summary: Option<&str>,
) -> Result<(), RepositoryError> {
    let position = i32::try_from(locked.version_count)
        .map_err(|_| RepositoryError::Corrupt(format!("history of {} is too long", id)))?;
    let created_at = next_timestamp(locked.updated_at, db_now());

    sqlx::query(
        r#"
        INSERT INTO test_artifact_versions (artifact_id, position, code, summary, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(position)
    .bind(code)
    .bind(summary)
    .bind(created_at)
    .execute(&mut **tx)
    .await?;

    sqlx::query("UPDATE test_artifacts SET updated_at = $2 WHERE id = $1")
        .bind(id)
        .bind(created_at)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[async_trait]
impl ArtifactRepository for PgArtifactRepository {
    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<TestArtifact>, RepositoryError> {
        let rows: Vec<ArtifactVersionRow> = sqlx::query_as(SELECT_BY_OWNER)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        into_artifacts(rows)
    }

    async fn list_by_path(
        &self,
        owner: Uuid,
        file_path: &str,
    ) -> Result<Vec<TestArtifact>, RepositoryError> {
        validate_file_path(file_path)?;
        let rows: Vec<ArtifactVersionRow> = sqlx::query_as(SELECT_BY_PATH)
            .bind(owner)
            .bind(file_path)
            .fetch_all(&self.pool)
            .await?;
        into_artifacts(rows)
    }

    async fn get_owned(&self, id: Uuid, owner: Uuid) -> Result<TestArtifact, RepositoryError> {
        fetch_owned(&self.pool, id, owner).await
    }

    async fn create(
        &self,
        owner: Uuid,
        artifact: NewTestArtifact,
    ) -> Result<TestArtifact, RepositoryError> {
        let artifact = TestArtifact::create(Uuid::new_v4(), owner, artifact, db_now())?;
        let first = artifact.current_version();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO test_artifacts (id, owner_id, file_path, framework, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(artifact.id)
        .bind(artifact.owner)
        .bind(&artifact.file_path)
        .bind(&artifact.framework)
        .bind(artifact.created_at)
        .bind(artifact.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO test_artifact_versions (artifact_id, position, code, summary, created_at)
            VALUES ($1, 0, $2, $3, $4)
            "#,
        )
        .bind(artifact.id)
        .bind(&first.code)
        .bind(&first.summary)
        .bind(first.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(artifact)
    }

    async fn append_version(
        &self,
        id: Uuid,
        owner: Uuid,
        version: NewVersion,
    ) -> Result<TestArtifact, RepositoryError> {
        version.validate()?;

        let mut tx = self.pool.begin().await?;
        let locked = lock_owned(&mut tx, id, owner).await?;
        append_locked(&mut tx, id, &locked, &version.code, version.summary.as_deref()).await?;
        let artifact = fetch_owned(&mut *tx, id, owner).await?;
        tx.commit().await?;

        Ok(artifact)
    }

    async fn restore_version(
        &self,
        id: Uuid,
        owner: Uuid,
        version_index: usize,
    ) -> Result<TestArtifact, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let locked = lock_owned(&mut tx, id, owner).await?;

        if version_index >= locked.version_count {
            return Err(RepositoryError::InvalidVersionIndex {
                index: version_index,
                len: locked.version_count,
            });
        }

        let source: VersionContentRow = sqlx::query_as(
            "SELECT code, summary FROM test_artifact_versions WHERE artifact_id = $1 AND position = $2",
        )
        .bind(id)
        .bind(version_index as i32)
        .fetch_one(&mut *tx)
        .await?;

        append_locked(&mut tx, id, &locked, &source.code, source.summary.as_deref()).await?;
        let artifact = fetch_owned(&mut *tx, id, owner).await?;
        tx.commit().await?;

        Ok(artifact)
    }

    async fn remove(&self, id: Uuid, owner: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM test_artifacts WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
