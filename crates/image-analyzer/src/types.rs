//! Core data types for caption acquisition and analysis.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Caption used when a backend answers without any generated text.
pub const UNAVAILABLE_CAPTION: &str = "Unable to generate caption";

/// Which inference service captions are requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Hugging Face Inference API.
    Hosted,
    /// Ollama-compatible model server.
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Hosted => write!(f, "hosted"),
            BackendKind::Local => write!(f, "local"),
        }
    }
}

/// Ordered list of model identifiers: primary first, then fallbacks.
///
/// Never empty: [`ModelCandidates::new`] is the only constructor. Duplicate
/// identifiers are dropped, keeping the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidates {
    models: Vec<String>,
}

impl ModelCandidates {
    /// Build a candidate list from a primary model and its fallbacks.
    pub fn new<I, S>(primary: impl Into<String>, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut models: Vec<String> = vec![primary.into()];
        for model in fallbacks {
            let model = model.into();
            if !models.contains(&model) {
                models.push(model);
            }
        }
        Self { models }
    }

    /// Default hosted captioning models.
    pub fn hosted_default() -> Self {
        Self::new(
            "nlpconnect/vit-gpt2-image-captioning",
            [
                "microsoft/git-base-coco",
                "ydshieh/vit-gpt2-coco-en",
                "Salesforce/blip-image-captioning-base",
            ],
        )
    }

    /// Default local-server vision models.
    pub fn local_default() -> Self {
        Self::new("moondream:latest", ["llava:latest"])
    }

    /// Default candidates for a backend kind.
    pub fn default_for(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Hosted => Self::hosted_default(),
            BackendKind::Local => Self::local_default(),
        }
    }

    /// Replace the primary model, keeping the fallbacks.
    pub fn with_primary(&self, primary: impl Into<String>) -> Self {
        Self::new(primary, self.fallbacks().iter().cloned())
    }

    /// Replace the fallbacks, keeping the primary model.
    pub fn with_fallbacks<I, S>(&self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(self.primary().to_string(), fallbacks)
    }

    pub fn primary(&self) -> &str {
        &self.models[0]
    }

    pub fn fallbacks(&self) -> &[String] {
        &self.models[1..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// False for every list built through `new`.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// One failed attempt against a candidate model.
#[derive(Debug)]
pub struct AttemptFailure {
    pub model: String,
    pub error: AnalyzerError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model {} failed: {}", self.model, self.error)
    }
}

/// Every candidate failed. Holds the attempts in the order they were tried.
#[derive(Debug)]
pub struct AggregateFailure {
    pub attempts: Vec<AttemptFailure>,
}

impl AggregateFailure {
    /// The attempt that failed last.
    pub fn last(&self) -> Option<&AttemptFailure> {
        self.attempts.last()
    }

    /// Names of every model that was tried.
    pub fn models(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.model.as_str()).collect()
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "All {} models failed", self.attempts.len())?;
        if let Some(last) = self.last() {
            write!(f, ". Last error: {last}")?;
        }
        Ok(())
    }
}

/// A caption returned by one of the candidates.
#[derive(Debug)]
pub struct Acquisition {
    pub caption: String,
    /// The model that produced the caption.
    pub model: String,
    /// Candidates that failed before `model` answered.
    pub failures: Vec<AttemptFailure>,
    pub elapsed_ms: u64,
}

/// Text analysis of a caption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// The caption itself.
    pub summary: String,
    /// Markdown block with the description and the detected objects.
    pub elements_markdown: String,
    /// Capitalized vocabulary words found in the caption. Unordered.
    pub objects: HashSet<String>,
}

/// Result of running the whole pipeline on one image.
#[derive(Debug)]
pub struct AnalysisReport {
    pub request_id: String,
    pub analysis: Analysis,
    pub model: String,
    pub failures: Vec<AttemptFailure>,
    pub original_size: (u32, u32),
    pub submitted_size: (u32, u32),
    pub elapsed_ms: u64,
}

/// Errors that can occur while analyzing an image.
#[derive(thiserror::Error, Debug)]
pub enum AnalyzerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Configuration error: HUGGINGFACE_TOKEN not found")]
    MissingToken,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Service unavailable (HTTP {status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("{0}")]
    AllCandidatesFailed(AggregateFailure),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_keep_order_and_drop_duplicates() {
        let c = ModelCandidates::new("a", ["b", "a", "c", "b"]);
        assert_eq!(c.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(c.primary(), "a");
        assert_eq!(c.fallbacks(), &["b".to_string(), "c".to_string()]);
        assert!(!c.is_empty());
    }

    #[test]
    fn test_with_primary_keeps_fallbacks() {
        let c = ModelCandidates::hosted_default().with_primary("my/model");
        assert_eq!(c.primary(), "my/model");
        assert_eq!(c.len(), 4);
    }

    #[test]
    fn test_primary_only_list_is_not_empty() {
        let c = ModelCandidates::new("solo", Vec::<String>::new());
        assert_eq!(c.len(), 1);
        assert!(!c.is_empty());
        assert_eq!(c.primary(), "solo");
        assert!(c.fallbacks().is_empty());

        // Clearing the fallbacks still leaves the primary.
        let c = ModelCandidates::local_default().with_fallbacks(Vec::<String>::new());
        assert_eq!(c.iter().collect::<Vec<_>>(), vec!["moondream:latest"]);
    }

    #[test]
    fn test_aggregate_message_names_last_error() {
        let failure = AggregateFailure {
            attempts: vec![
                AttemptFailure {
                    model: "a".into(),
                    error: AnalyzerError::Timeout(60),
                },
                AttemptFailure {
                    model: "b".into(),
                    error: AnalyzerError::Connection("refused".into()),
                },
            ],
        };
        let msg = AnalyzerError::AllCandidatesFailed(failure).to_string();
        assert_eq!(
            msg,
            "All 2 models failed. Last error: Model b failed: Connection error: refused"
        );
    }
}
