// Blocking HTTP client for the TestVault API.
//
// Every request carries the session token as a bearer header. Error
// responses have the shape `{ "error": "..." }`; that message is surfaced
// to the user together with the status code.

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use testvault_core::{NewTestArtifact, NewVersion, TestArtifact};
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct ArtifactEnvelope {
    artifact: TestArtifact,
}

#[derive(Debug, Deserialize)]
struct ArtifactList {
    artifacts: Vec<TestArtifact>,
}

#[derive(Debug, Deserialize)]
struct CodeEnvelope {
    code: String,
}

/// Input for server-side test generation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub file_path: String,
    pub file_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub summary: String,
}

pub struct ApiClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Absolute URL for an API path such as `/artifacts`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &self.url(path))
            .set("Authorization", &format!("Bearer {}", self.token))
    }

    pub fn list(&self, file_path: Option<&str>) -> Result<Vec<TestArtifact>> {
        let mut request = self.request("GET", "/artifacts");
        if let Some(file_path) = file_path {
            request = request.query("filePath", file_path);
        }
        let list: ArtifactList = self.call(request, None)?;
        Ok(list.artifacts)
    }

    pub fn get(&self, id: Uuid) -> Result<TestArtifact> {
        let envelope: ArtifactEnvelope =
            self.call(self.request("GET", &format!("/artifacts/{}", id)), None)?;
        Ok(envelope.artifact)
    }

    pub fn create(&self, artifact: &NewTestArtifact) -> Result<TestArtifact> {
        let envelope: ArtifactEnvelope = self.call(
            self.request("POST", "/artifacts"),
            Some(serde_json::to_value(artifact)?),
        )?;
        Ok(envelope.artifact)
    }

    pub fn append(&self, id: Uuid, version: &NewVersion) -> Result<TestArtifact> {
        let envelope: ArtifactEnvelope = self.call(
            self.request("PUT", &format!("/artifacts/{}", id)),
            Some(serde_json::to_value(version)?),
        )?;
        Ok(envelope.artifact)
    }

    pub fn restore(&self, id: Uuid, version_index: i64) -> Result<TestArtifact> {
        let envelope: ArtifactEnvelope = self.call(
            self.request("POST", &format!("/artifacts/{}/restore", id)),
            Some(serde_json::json!({ "versionIndex": version_index })),
        )?;
        Ok(envelope.artifact)
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        let _: Value = self.call(self.request("DELETE", &format!("/artifacts/{}", id)), None)?;
        Ok(())
    }

    /// Generates test code without saving it.
    pub fn generate_code(&self, request: &GenerateRequest) -> Result<String> {
        let envelope: CodeEnvelope = self.call(
            self.request("POST", "/generate/code"),
            Some(serde_json::to_value(request)?),
        )?;
        Ok(envelope.code)
    }

    /// Generates test code and saves it as a new artifact.
    pub fn generate_and_save(&self, request: &GenerateRequest) -> Result<TestArtifact> {
        let envelope: ArtifactEnvelope = self.call(
            self.request("POST", "/artifacts/generate"),
            Some(serde_json::to_value(request)?),
        )?;
        Ok(envelope.artifact)
    }

    fn call<T: DeserializeOwned>(&self, request: ureq::Request, body: Option<Value>) -> Result<T> {
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        match result {
            Ok(response) => response
                .into_json::<T>()
                .map_err(|e| anyhow!("Failed to parse server response: {}", e)),
            Err(ureq::Error::Status(code, response)) => {
                let message = response
                    .into_string()
                    .ok()
                    .and_then(|text| error_message(&text))
                    .unwrap_or_else(|| "request failed".to_string());
                Err(anyhow!("{} (HTTP {})", message, code))
            }
            Err(ureq::Error::Transport(e)) => {
                Err(anyhow!("Failed to reach {}: {}", self.base_url, e))
            }
        }
    }
}

/// Extracts the message from an `{ "error": ... }` response body.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
}
