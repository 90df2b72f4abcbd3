//! Ollama-compatible local model server client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{classify_status, classify_transport, error_message, truncate, CaptionBackend};
use crate::capture::EncodedImage;
use crate::config::LocalServerConfig;
use crate::types::{AnalyzerError, AnalyzerResult, BackendKind};

/// Timeout for the model listing used by readiness checks.
const TAGS_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Client for a locally running model server.
pub struct LocalServerBackend {
    client: Client,
    config: LocalServerConfig,
}

impl LocalServerBackend {
    pub fn new(config: LocalServerConfig) -> AnalyzerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalyzerError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        tracing::info!("Local model server configured: {}", config.server_url);
        Ok(Self { client, config })
    }

    pub fn server_url(&self) -> &str {
        &self.config.server_url
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> AnalyzerResult<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.config.server_url))
            .timeout(Duration::from_secs(TAGS_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| classify_transport(e, TAGS_TIMEOUT_SECS))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(e, TAGS_TIMEOUT_SECS))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), error_message(&body)));
        }

        let tags: TagsResponse = serde_json::from_str(&body)
            .map_err(|e| AnalyzerError::UnexpectedResponse(format!("{e}: {}", truncate(&body))))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether `model` (any tag) is installed on the server.
    pub async fn has_model(&self, model: &str) -> AnalyzerResult<bool> {
        Ok(is_model_installed(&self.list_models().await?, model))
    }
}

/// Match `model` against installed names, ignoring the tag.
pub fn is_model_installed(installed: &[String], model: &str) -> bool {
    let base = model.split(':').next().unwrap_or(model);
    installed.iter().any(|name| name.contains(base))
}

#[async_trait]
impl CaptionBackend for LocalServerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn caption(&self, image: &EncodedImage, model: &str) -> AnalyzerResult<String> {
        let url = format!("{}/api/generate", self.config.server_url);
        let request = GenerateRequest {
            model,
            prompt: &self.config.prompt,
            images: vec![image.to_base64()],
            stream: false,
        };
        tracing::debug!("POST {url} model={model}");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(e, self.config.timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(e, self.config.timeout_secs))?;
        tracing::debug!("Response {status}: {}", truncate(&body));

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), error_message(&body)));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| AnalyzerError::UnexpectedResponse(format!("{e}: {}", truncate(&body))))?;
        Ok(parsed.response.trim().to_string())
    }
}
