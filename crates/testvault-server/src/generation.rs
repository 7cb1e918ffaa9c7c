//! Test generation backends.
//!
//! Generated summaries and code are inputs to the artifact service; nothing
//! here touches storage. The only backend today is [`FallbackGenerator`],
//! which renders static per-framework templates.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GeneratorKind;

/// Failure reported by a generation backend.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{0}")]
    Backend(String),
}

/// A repository file to summarize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
}

/// Candidate test-case summaries for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummaries {
    pub path: String,
    pub summaries: Vec<String>,
}

/// Input for generating test code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRequest {
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_content: String,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub summary: String,
}

/// One file of a batch generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFile {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub summary: String,
}

/// Per-file outcome of a batch generation; exactly one of `code` and
/// `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A generation result about to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTest {
    pub code: String,
    pub summary: Option<String>,
}

#[async_trait]
pub trait TestGenerator: Send + Sync {
    /// Proposes test-case summaries for each file.
    async fn summaries(&self, files: &[SourceFile]) -> Result<Vec<FileSummaries>, GenerationError>;

    /// Renders test code for one file and summary.
    async fn test_code(&self, request: &CodeRequest) -> Result<String, GenerationError>;
}

/// Builds the configured generator.
pub fn build_generator(kind: GeneratorKind) -> Arc<dyn TestGenerator> {
    match kind {
        GeneratorKind::Fallback => Arc::new(FallbackGenerator),
    }
}

/// Static, offline generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackGenerator;

#[async_trait]
impl TestGenerator for FallbackGenerator {
    async fn summaries(&self, files: &[SourceFile]) -> Result<Vec<FileSummaries>, GenerationError> {
        Ok(files.iter().map(|f| fallback_summaries(&f.path)).collect())
    }

    async fn test_code(&self, request: &CodeRequest) -> Result<String, GenerationError> {
        let framework = request
            .framework
            .as_deref()
            .unwrap_or(testvault_core::DEFAULT_FRAMEWORK);
        Ok(fallback_test_code(framework, &request.file_path, &request.summary))
    }
}

/// Template family chosen from a free-form framework label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    PyTest,
    JUnit,
    Jest,
}

impl TemplateKind {
    pub fn from_label(framework: &str) -> Self {
        let label = framework.to_lowercase();
        if label.contains("pytest") || label.contains("python") {
            TemplateKind::PyTest
        } else if label.contains("junit") || label.contains("java") {
            TemplateKind::JUnit
        } else {
            TemplateKind::Jest
        }
    }
}

pub fn fallback_summaries(path: &str) -> FileSummaries {
    FileSummaries {
        path: path.to_string(),
        summaries: vec![
            format!("Smoke test for exported functions in {}", path),
            format!("Error/edge cases for core methods in {}", path),
            format!("Integration flow covering main public API of {}", path),
        ],
    }
}

pub fn fallback_test_code(framework: &str, file_path: &str, summary: &str) -> String {
    let base_name = file_path.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("module");
    let stem = Path::new(base_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(base_name);

    match TemplateKind::from_label(framework) {
        TemplateKind::PyTest => pytest_template(file_path, stem),
        TemplateKind::JUnit => junit_template(file_path, stem),
        TemplateKind::Jest => jest_template(file_path, base_name, summary),
    }
}

/// `stem` reduced to characters valid in an identifier.
fn identifier(stem: &str) -> String {
    let ident: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if ident.is_empty() {
        "module".to_string()
    } else {
        ident
    }
}

fn pytest_template(file_path: &str, stem: &str) -> String {
    let ident = identifier(stem);
    format!(
        r#"# Auto-generated PyTest for {file_path}
import importlib
import pytest

module = importlib.import_module("{stem}")

def test_smoke_{ident}():
    assert module is not None

def test_edge_{ident}():
    # Replace with real edge case assertions
    assert True

def test_integration_{ident}():
    # Replace with a real integration flow
    assert True
"#
    )
}

fn junit_template(file_path: &str, stem: &str) -> String {
    let ident = identifier(stem);
    let mut chars = ident.chars();
    let class_name: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Module".to_string(),
    };
    format!(
        r#"// Auto-generated JUnit test for {file_path}
import static org.junit.jupiter.api.Assertions.*;
import org.junit.jupiter.api.Test;

public class {class_name}Test {{
  @Test
  public void smokeTest() {{
    assertTrue(true);
  }}

  @Test
  public void edgeCases() {{
    assertEquals(1, 1);
  }}

  @Test
  public void integrationFlow() {{
    assertNotNull(new Object());
  }}
}}
"#
    )
}

fn jest_template(file_path: &str, base_name: &str, summary: &str) -> String {
    let import_path = if file_path.starts_with('.') {
        file_path.to_string()
    } else {
        format!("./{}", base_name)
    };
    let title = summary.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        r#"// Auto-generated Jest test for {file_path}
import * as Module from '{import_path}';

describe('{title}', () => {{
  test('smoke: module loads', () => {{
    expect(Module).toBeTruthy();
  }});

  test('edge: placeholder', () => {{
    expect(true).toBe(true);
  }});

  test('integration: placeholder', () => {{
    expect(1 + 1).toBe(2);
  }});
}});
"#
    )
}
