//! Configuration loading and resolution.
//!
//! Precedence is command-line flag, then environment (including `.env`),
//! then built-in default.

use image_analyzer::config::DEFAULT_SERVER_URL;
use image_analyzer::{
    AnalyzerError, AnalyzerResult, BackendConfig, BackendKind, HostedConfig, LocalServerConfig,
    ModelCandidates,
};

pub const TOKEN_ENV: &str = "HUGGINGFACE_TOKEN";
pub const SERVER_URL_ENV: &str = "IMAGE_ANALYZER_SERVER_URL";
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";
pub const BACKEND_ENV: &str = "IMAGE_ANALYZER_BACKEND";
pub const MODEL_ENV: &str = "IMAGE_ANALYZER_MODEL";

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend: Option<BackendKind>,
    pub token: Option<String>,
    pub server_url: Option<String>,
    pub model: Option<String>,
    pub fallbacks: Vec<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: BackendKind,
    pub token: Option<String>,
    pub server_url: String,
    pub model: Option<String>,
    pub fallbacks: Vec<String>,
}

impl Settings {
    /// Resolve settings using `lookup` for environment variables.
    pub fn resolve<F>(overrides: &Overrides, lookup: F) -> AnalyzerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match overrides.backend {
            Some(kind) => kind,
            None => match non_empty(BACKEND_ENV) {
                Some(raw) => parse_backend(&raw)?,
                None => BackendKind::Hosted,
            },
        };

        let token = overrides.token.clone().or_else(|| lookup(TOKEN_ENV));

        let server_url = overrides
            .server_url
            .clone()
            .or_else(|| non_empty(SERVER_URL_ENV))
            .or_else(|| non_empty(OLLAMA_HOST_ENV))
            .map(|raw| normalize_server_url(&raw))
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        let model = overrides.model.clone().or_else(|| non_empty(MODEL_ENV));

        Ok(Self {
            backend,
            token,
            server_url,
            model,
            fallbacks: overrides.fallbacks.clone(),
        })
    }

    /// Load `.env` if present, then resolve against the process environment.
    pub fn from_env(overrides: &Overrides) -> AnalyzerResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Failed to read .env file: {e}"),
        }
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Same settings with a different backend.
    pub fn with_backend(&self, backend: BackendKind) -> Self {
        Self {
            backend,
            ..self.clone()
        }
    }

    /// Candidate models for the active backend.
    pub fn candidates(&self) -> ModelCandidates {
        let mut candidates = ModelCandidates::default_for(self.backend);
        if let Some(model) = &self.model {
            candidates = candidates.with_primary(model.clone());
        }
        if !self.fallbacks.is_empty() {
            candidates = candidates.with_fallbacks(self.fallbacks.iter().cloned());
        }
        candidates
    }

    /// Validate and build the backend configuration.
    pub fn backend_config(&self) -> AnalyzerResult<BackendConfig> {
        Ok(match self.backend {
            BackendKind::Hosted => BackendConfig::Hosted(HostedConfig::new(self.token.as_deref())?),
            BackendKind::Local => BackendConfig::Local(LocalServerConfig::new(&self.server_url)?),
        })
    }
}

/// Parse a backend name as used in flags, env vars and the REPL.
pub fn parse_backend(raw: &str) -> AnalyzerResult<BackendKind> {
    match raw.trim().to_lowercase().as_str() {
        "hosted" | "huggingface" | "hf" => Ok(BackendKind::Hosted),
        "local" | "ollama" => Ok(BackendKind::Local),
        other => Err(AnalyzerError::Configuration(format!(
            "Unknown backend '{other}'. Use 'hosted' or 'local'."
        ))),
    }
}

/// Add an `http://` scheme to bare `host:port` values such as `OLLAMA_HOST`.
pub fn normalize_server_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let s = Settings::resolve(&Overrides::default(), env(&[])).unwrap();
        assert_eq!(s.backend, BackendKind::Hosted);
        assert_eq!(s.server_url, DEFAULT_SERVER_URL);
        assert!(s.token.is_none());
        assert_eq!(s.candidates(), ModelCandidates::hosted_default());
    }

    #[test]
    fn test_flag_beats_env() {
        let overrides = Overrides {
            backend: Some(BackendKind::Local),
            server_url: Some("http://gpu-box:11434".into()),
            ..Default::default()
        };
        let s = Settings::resolve(
            &overrides,
            env(&[(BACKEND_ENV, "hosted"), (SERVER_URL_ENV, "http://other:1")]),
        )
        .unwrap();
        assert_eq!(s.backend, BackendKind::Local);
        assert_eq!(s.server_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_ollama_host_is_normalized() {
        let s = Settings::resolve(
            &Overrides::default(),
            env(&[(OLLAMA_HOST_ENV, "127.0.0.1:11434")]),
        )
        .unwrap();
        assert_eq!(s.server_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn test_unknown_backend_env() {
        let err = Settings::resolve(&Overrides::default(), env(&[(BACKEND_ENV, "gpu")]))
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Configuration(_)));
    }

    #[test]
    fn test_model_overrides() {
        let overrides = Overrides {
            fallbacks: vec!["b".into(), "c".into()],
            ..Default::default()
        };
        let s = Settings::resolve(&overrides, env(&[(MODEL_ENV, "a")])).unwrap();
        let names: Vec<_> = s.candidates().iter().map(str::to_string).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let local = s.with_backend(BackendKind::Local);
        assert_eq!(local.candidates().primary(), "a");
    }

    #[test]
    fn test_missing_token_fails_hosted_config() {
        let s = Settings::resolve(&Overrides::default(), env(&[])).unwrap();
        assert!(matches!(s.backend_config(), Err(AnalyzerError::MissingToken)));
        // The local backend does not need a token.
        assert!(s.with_backend(BackendKind::Local).backend_config().is_ok());
    }

    #[test]
    fn test_parse_backend_aliases() {
        assert_eq!(parse_backend("Ollama").unwrap(), BackendKind::Local);
        assert_eq!(parse_backend("hf").unwrap(), BackendKind::Hosted);
    }
}
