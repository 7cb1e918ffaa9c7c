//! Database models for TestVault.

pub mod test_artifact;

pub use test_artifact::{group_rows, ArtifactVersionRow, VersionContentRow};
