// TestVault Core - Versioned test artifact model

pub mod artifact;
pub mod error;

pub use artifact::{
    next_timestamp, validate_code, validate_file_path, NewTestArtifact, NewVersion, TestArtifact,
    Version, DEFAULT_FRAMEWORK,
};
pub use error::ArtifactError;
