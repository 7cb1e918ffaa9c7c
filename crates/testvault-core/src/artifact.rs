//! Test artifact and version history model.
//!
//! A [`TestArtifact`] is the evolving test suite for one `(owner, file path)`
//! pair. Its versions form an append-only sequence: the current version is
//! always the last element, and restoring an old version appends a copy of it
//! rather than rewinding history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ArtifactError;

/// Framework label used when a request does not name one.
pub const DEFAULT_FRAMEWORK: &str = "Jest";

/// One immutable snapshot within an artifact's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    /// Generated or edited test source.
    pub code: String,
    /// Test-case summary the code was generated from.
    pub summary: Option<String>,
    /// When this version was appended.
    pub created_at: DateTime<Utc>,
}

/// The persistent, versioned test-suite record for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ArtifactRecord")]
pub struct TestArtifact {
    /// System-assigned identifier.
    pub id: Uuid,
    /// User id of the owning principal.
    pub owner: Uuid,
    /// Repository path of the file under test.
    pub file_path: String,
    /// Test framework label ("Jest", "PyTest", "JUnit", ...).
    pub framework: String,
    versions: Vec<Version>,
    /// When the artifact was first saved.
    pub created_at: DateTime<Utc>,
    /// When the last version was appended.
    pub updated_at: DateTime<Utc>,
}

/// Wire shape accepted when deserializing; converted through the
/// non-empty history check in [`TestArtifact::from_parts`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactRecord {
    id: Uuid,
    owner: Uuid,
    file_path: String,
    framework: String,
    versions: Vec<Version>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ArtifactRecord> for TestArtifact {
    type Error = ArtifactError;

    fn try_from(record: ArtifactRecord) -> Result<Self, Self::Error> {
        TestArtifact::from_parts(
            record.id,
            record.owner,
            record.file_path,
            record.framework,
            record.versions,
            record.created_at,
            record.updated_at,
        )
    }
}

/// Data required to create a new artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTestArtifact {
    pub file_path: String,
    #[serde(default)]
    pub framework: Option<String>,
    pub code: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Data required to append a version to an existing artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVersion {
    pub code: String,
    #[serde(default)]
    pub summary: Option<String>,
}

impl NewTestArtifact {
    /// Checks the required fields.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        validate_file_path(&self.file_path)?;
        validate_code(&self.code)
    }

    /// The requested framework, or [`DEFAULT_FRAMEWORK`] when blank.
    pub fn framework_or_default(&self) -> String {
        match self.framework.as_deref().map(str::trim) {
            Some(framework) if !framework.is_empty() => framework.to_string(),
            _ => DEFAULT_FRAMEWORK.to_string(),
        }
    }
}

impl NewVersion {
    pub fn validate(&self) -> Result<(), ArtifactError> {
        validate_code(&self.code)
    }
}

/// Rejects an empty or whitespace-only file path.
pub fn validate_file_path(file_path: &str) -> Result<(), ArtifactError> {
    if file_path.trim().is_empty() {
        return Err(ArtifactError::InvalidInput("filePath is required".to_string()));
    }
    Ok(())
}

/// Rejects empty or whitespace-only test code.
pub fn validate_code(code: &str) -> Result<(), ArtifactError> {
    if code.trim().is_empty() {
        return Err(ArtifactError::InvalidInput("code is required".to_string()));
    }
    Ok(())
}

/// Timestamp for the next history entry: never earlier than `previous`.
pub fn next_timestamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    previous.max(now)
}

impl TestArtifact {
    /// Creates an artifact holding exactly one version.
    pub fn create(
        id: Uuid,
        owner: Uuid,
        new: NewTestArtifact,
        now: DateTime<Utc>,
    ) -> Result<Self, ArtifactError> {
        new.validate()?;
        let framework = new.framework_or_default();
        Ok(Self {
            id,
            owner,
            file_path: new.file_path,
            framework,
            versions: vec![Version {
                code: new.code,
                summary: new.summary,
                created_at: now,
            }],
            created_at: now,
            updated_at: now,
        })
    }

    /// Reassembles an artifact from stored parts.
    ///
    /// Fails when `versions` is empty, since an artifact without history
    /// cannot exist.
    pub fn from_parts(
        id: Uuid,
        owner: Uuid,
        file_path: String,
        framework: String,
        versions: Vec<Version>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ArtifactError> {
        if versions.is_empty() {
            return Err(ArtifactError::InvalidInput(format!(
                "Test artifact {} has no versions",
                id
            )));
        }
        Ok(Self {
            id,
            owner,
            file_path,
            framework,
            versions,
            created_at,
            updated_at,
        })
    }

    /// Full history, oldest first.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// The last element of the history.
    pub fn current_version(&self) -> &Version {
        // Non-empty by construction.
        &self.versions[self.versions.len() - 1]
    }

    pub fn current_index(&self) -> usize {
        self.versions.len() - 1
    }

    pub fn is_owned_by(&self, owner: Uuid) -> bool {
        self.owner == owner
    }

    /// Appends a new version and makes it current.
    pub fn push_version(
        &mut self,
        version: NewVersion,
        now: DateTime<Utc>,
    ) -> Result<&Version, ArtifactError> {
        version.validate()?;
        Ok(self.append(version.code, version.summary, now))
    }

    /// Appends a copy of `versions[index]` as the new current version.
    ///
    /// The historical entry at `index` is left untouched.
    pub fn restore_version(
        &mut self,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<&Version, ArtifactError> {
        let source = self
            .versions
            .get(index)
            .ok_or(ArtifactError::InvalidVersionIndex {
                index: index as i64,
                len: self.versions.len(),
            })?;
        let (code, summary) = (source.code.clone(), source.summary.clone());
        Ok(self.append(code, summary, now))
    }

    fn append(&mut self, code: String, summary: Option<String>, now: DateTime<Utc>) -> &Version {
        let created_at = next_timestamp(self.updated_at, now);
        self.versions.push(Version {
            code,
            summary,
            created_at,
        });
        self.updated_at = created_at;
        &self.versions[self.versions.len() - 1]
    }
}
