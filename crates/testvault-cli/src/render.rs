// Terminal rendering for artifacts and their histories.

use chrono::{DateTime, Utc};
use colored::Colorize;
use testvault_core::TestArtifact;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// One-line listing entry: id, target file, framework, version count.
pub fn list_line(artifact: &TestArtifact) -> String {
    let versions = match artifact.version_count() {
        1 => "1 version".to_string(),
        n => format!("{} versions", n),
    };
    format!(
        "{}  {}  [{}]  {}  updated {}",
        artifact.id.to_string().dimmed(),
        artifact.file_path.bold(),
        artifact.framework.cyan(),
        versions,
        timestamp(&artifact.updated_at)
    )
}

pub fn print_list(artifacts: &[TestArtifact]) {
    if artifacts.is_empty() {
        println!("{}", "No saved test artifacts.".dimmed());
        return;
    }
    for artifact in artifacts {
        println!("{}", list_line(artifact));
    }
}

/// Prints the artifact header followed by one line per version. The current
/// version is marked with `*`.
pub fn print_history(artifact: &TestArtifact) {
    print_header(artifact);
    println!();
    let current = artifact.current_index();
    for (index, version) in artifact.versions().iter().enumerate() {
        let marker = if index == current {
            "*".green().bold().to_string()
        } else {
            " ".to_string()
        };
        let summary = version.summary.as_deref().unwrap_or("(no summary)");
        println!(
            "{} {:>3}  {}  {}",
            marker,
            index,
            timestamp(&version.created_at).dimmed(),
            summary
        );
    }
}

/// Prints the code of `versions[index]`, or of the current version.
pub fn print_version(artifact: &TestArtifact, index: Option<usize>) -> anyhow::Result<()> {
    let index = index.unwrap_or_else(|| artifact.current_index());
    let version = artifact.versions().get(index).ok_or_else(|| {
        anyhow::anyhow!(
            "Version {} does not exist (artifact has {} versions)",
            index,
            artifact.version_count()
        )
    })?;

    print_header(artifact);
    println!(
        "  Version:   {} of {}",
        index,
        artifact.version_count() - 1
    );
    if let Some(summary) = &version.summary {
        println!("  Summary:   {}", summary);
    }
    println!();
    println!("{}", version.code);
    Ok(())
}

/// Confirmation printed after a mutation.
pub fn print_saved(action: &str, artifact: &TestArtifact) {
    println!("{} {}", "✓".green().bold(), action.green());
    println!();
    print_header(artifact);
    println!("  Versions:  {}", artifact.version_count());
}

fn print_header(artifact: &TestArtifact) {
    println!("  Artifact:  {}", artifact.id);
    println!("  File:      {}", artifact.file_path);
    println!("  Framework: {}", artifact.framework);
    println!("  Updated:   {}", timestamp(&artifact.updated_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use testvault_core::NewTestArtifact;
    use uuid::Uuid;

    #[test]
    fn test_list_line_mentions_path_and_count() {
        colored::control::set_override(false);
        let artifact = TestArtifact::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NewTestArtifact {
                file_path: "src/math.js".to_string(),
                framework: None,
                code: "t1".to_string(),
                summary: None,
            },
            Utc::now(),
        )
        .unwrap();
        let line = list_line(&artifact);
        assert!(line.contains("src/math.js"));
        assert!(line.contains("[Jest]"));
        assert!(line.contains("1 version"));
        assert!(!line.contains("1 versions"));
    }
}
