//! Backend configuration and validation.

use std::sync::Arc;

use url::Url;

use crate::backend::{CaptionBackend, HostedBackend, LocalServerBackend};
use crate::types::{AnalyzerError, AnalyzerResult, BackendKind};

/// Hosted inference endpoint; the model id is appended as a path.
pub const DEFAULT_HOSTED_URL: &str = "https://router.huggingface.co/hf-inference/models";

/// Default Ollama address.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:11434";

/// Request timeout for the hosted API.
pub const HOSTED_TIMEOUT_SECS: u64 = 60;

/// Request timeout for the local model server.
pub const LOCAL_TIMEOUT_SECS: u64 = 60;

/// Prompt sent to local vision models.
pub const DEFAULT_PROMPT: &str = "Describe this image in detail.";

/// Placeholder value shipped in sample `.env` files.
const PLACEHOLDER_TOKEN: &str = "your_token_here";

/// Settings for the hosted inference API.
#[derive(Debug, Clone)]
pub struct HostedConfig {
    pub token: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl HostedConfig {
    /// Validate a token and use the default endpoint.
    pub fn new(token: Option<&str>) -> AnalyzerResult<Self> {
        Ok(Self {
            token: validate_token(token)?,
            base_url: DEFAULT_HOSTED_URL.to_string(),
            timeout_secs: HOSTED_TIMEOUT_SECS,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> AnalyzerResult<Self> {
        self.base_url = validate_server_url(base_url)?
            .as_str()
            .trim_end_matches('/')
            .to_string();
        Ok(self)
    }
}

/// Settings for a local Ollama-compatible server.
#[derive(Debug, Clone)]
pub struct LocalServerConfig {
    pub server_url: String,
    pub prompt: String,
    pub timeout_secs: u64,
}

impl LocalServerConfig {
    pub fn new(server_url: &str) -> AnalyzerResult<Self> {
        let url = validate_server_url(server_url)?;
        Ok(Self {
            server_url: url.as_str().trim_end_matches('/').to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            timeout_secs: LOCAL_TIMEOUT_SECS,
        })
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

/// The one backend active for a run.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Hosted(HostedConfig),
    Local(LocalServerConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Hosted(_) => BackendKind::Hosted,
            BackendConfig::Local(_) => BackendKind::Local,
        }
    }

    /// Construct the HTTP client for this backend.
    pub fn build(&self) -> AnalyzerResult<Arc<dyn CaptionBackend>> {
        Ok(match self {
            BackendConfig::Hosted(cfg) => Arc::new(HostedBackend::new(cfg.clone())?),
            BackendConfig::Local(cfg) => Arc::new(LocalServerBackend::new(cfg.clone())?),
        })
    }
}

/// Check that an API token is present and not a placeholder.
///
/// Tokens without the `hf_` prefix are accepted with a warning.
pub fn validate_token(token: Option<&str>) -> AnalyzerResult<String> {
    let token = token.map(str::trim).unwrap_or("");
    if token.is_empty() || token == PLACEHOLDER_TOKEN {
        tracing::error!("Valid HUGGINGFACE_TOKEN not found");
        return Err(AnalyzerError::MissingToken);
    }
    if token.chars().any(char::is_whitespace) {
        return Err(AnalyzerError::Configuration(
            "API token must not contain whitespace".to_string(),
        ));
    }
    if !token.starts_with("hf_") {
        tracing::warn!("Token doesn't start with 'hf_' - this might be invalid");
    }
    Ok(token.to_string())
}

/// Parse a server URL; only absolute http(s) URLs are accepted.
pub fn validate_server_url(raw: &str) -> AnalyzerResult<Url> {
    let raw = raw.trim();
    let url = Url::parse(raw)
        .map_err(|e| AnalyzerError::Configuration(format!("Invalid server URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AnalyzerError::Configuration(format!(
                "Unsupported URL scheme '{other}' in '{raw}'. Use http or https."
            )));
        }
    }
    if url.host_str().is_none() {
        return Err(AnalyzerError::Configuration(format!(
            "Server URL '{raw}' has no host"
        )));
    }
    Ok(url)
}
