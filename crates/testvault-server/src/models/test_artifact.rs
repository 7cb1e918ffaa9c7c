//! Row mapping for stored test artifacts and their version history.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use testvault_core::{TestArtifact, Version};
use uuid::Uuid;

/// One artifact joined with one of its versions.
///
/// Artifacts are read with a single join so the artifact header and its
/// history come from the same statement snapshot.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactVersionRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub file_path: String,
    pub framework: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Zero-based position in the history.
    pub position: i32,
    pub code: String,
    pub summary: Option<String>,
    pub version_created_at: DateTime<Utc>,
}

/// Source version read while holding the artifact row lock.
#[derive(Debug, Clone, FromRow)]
pub struct VersionContentRow {
    pub code: String,
    pub summary: Option<String>,
}

impl ArtifactVersionRow {
    fn version(&self) -> Version {
        Version {
            code: self.code.clone(),
            summary: self.summary.clone(),
            created_at: self.version_created_at,
        }
    }
}

/// Groups joined rows into artifacts.
///
/// Rows must be ordered by artifact, then by `position`; artifact order is
/// preserved. Fails on a gap or reordering in a history.
pub fn group_rows(rows: Vec<ArtifactVersionRow>) -> Result<Vec<TestArtifact>, String> {
    let mut artifacts = Vec::new();
    let mut current: Option<(ArtifactVersionRow, Vec<Version>)> = None;

    for row in rows {
        let same_artifact = matches!(&current, Some((head, _)) if head.id == row.id);

        if same_artifact {
            if let Some((_, versions)) = current.as_mut() {
                if row.position as usize != versions.len() {
                    return Err(format!(
                        "Test artifact {} has version {} where {} was expected",
                        row.id,
                        row.position,
                        versions.len()
                    ));
                }
                versions.push(row.version());
            }
            continue;
        }

        if let Some((head, versions)) = current.take() {
            artifacts.push(assemble(head, versions)?);
        }
        if row.position != 0 {
            return Err(format!(
                "Test artifact {} history starts at version {}",
                row.id, row.position
            ));
        }
        let first = row.version();
        current = Some((row, vec![first]));
    }

    if let Some((head, versions)) = current {
        artifacts.push(assemble(head, versions)?);
    }

    Ok(artifacts)
}

fn assemble(head: ArtifactVersionRow, versions: Vec<Version>) -> Result<TestArtifact, String> {
    TestArtifact::from_parts(
        head.id,
        head.owner_id,
        head.file_path,
        head.framework,
        versions,
        head.created_at,
        head.updated_at,
    )
    .map_err(|e| e.to_string())
}
