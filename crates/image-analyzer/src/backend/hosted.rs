//! Hugging Face Inference API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;

use super::{classify_status, classify_transport, error_message, truncate, CaptionBackend};
use crate::capture::EncodedImage;
use crate::config::HostedConfig;
use crate::types::{AnalyzerError, AnalyzerResult, BackendKind, UNAVAILABLE_CAPTION};

/// Shapes the image-to-text endpoint is known to answer with.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostedResponse {
    Text(String),
    List(Vec<GeneratedText>),
    Error { error: String },
    Single(GeneratedText),
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    #[serde(default)]
    generated_text: Option<String>,
}

/// Client for the hosted image-to-text API.
pub struct HostedBackend {
    client: Client,
    config: HostedConfig,
}

impl HostedBackend {
    pub fn new(config: HostedConfig) -> AnalyzerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalyzerError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        tracing::info!("Hosted inference client configured: {}", config.base_url);
        Ok(Self { client, config })
    }

    fn model_url(&self, model: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            model.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl CaptionBackend for HostedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Hosted
    }

    async fn caption(&self, image: &EncodedImage, model: &str) -> AnalyzerResult<String> {
        let url = self.model_url(model);
        tracing::debug!("POST {url} ({} bytes)", image.bytes.len());

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.token))
            .header(CONTENT_TYPE, image.mime)
            .body(image.bytes.clone())
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

        parse_caption(status.as_u16(), &body)
    }
}

/// Extract the caption from a successful response body.
pub(crate) fn parse_caption(status: u16, body: &str) -> AnalyzerResult<String> {
    let parsed: HostedResponse = serde_json::from_str(body)
        .map_err(|e| AnalyzerError::UnexpectedResponse(format!("{e}: {}", truncate(body))))?;

    match parsed {
        HostedResponse::Text(text) => Ok(text.trim().to_string()),
        HostedResponse::List(items) => {
            tracing::debug!("Hosted model returned list with {} items", items.len());
            Ok(items
                .into_iter()
                .next()
                .and_then(|item| item.generated_text)
                .map(|text| text.trim().to_string())
                .unwrap_or_else(|| {
                    tracing::warn!("Hosted response has no generated_text");
                    UNAVAILABLE_CAPTION.to_string()
                }))
        }
        HostedResponse::Single(item) => Ok(item
            .generated_text
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|| UNAVAILABLE_CAPTION.to_string())),
        HostedResponse::Error { error } => Err(classify_status(status, error)),
    }
}
