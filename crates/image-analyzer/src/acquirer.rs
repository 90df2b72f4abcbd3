//! Caption acquisition with ordered model fallback.

use std::sync::Arc;
use std::time::Instant;

use crate::backend::CaptionBackend;
use crate::capture::EncodedImage;
use crate::types::{
    Acquisition, AggregateFailure, AnalyzerError, AnalyzerResult, AttemptFailure,
    ModelCandidates,
};

/// Tries each candidate model once, in order, until one returns a caption.
#[derive(Clone)]
pub struct CaptionAcquirer {
    backend: Arc<dyn CaptionBackend>,
}

impl CaptionAcquirer {
    pub fn new(backend: Arc<dyn CaptionBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn CaptionBackend> {
        &self.backend
    }

    /// Return the first caption any candidate produces.
    ///
    /// Failed attempts are logged and recorded; only when every candidate
    /// has failed is an [`AnalyzerError::AllCandidatesFailed`] returned.
    pub async fn acquire(
        &self,
        image: &EncodedImage,
        candidates: &ModelCandidates,
    ) -> AnalyzerResult<Acquisition> {
        let start = Instant::now();
        let total = candidates.len();
        tracing::info!(
            "Will try {total} {} models: {:?}",
            self.backend.kind(),
            candidates.iter().collect::<Vec<_>>()
        );

        let mut failures = Vec::new();

        for (i, model) in candidates.iter().enumerate() {
            tracing::info!("Attempting model {}/{total}: {model}", i + 1);

            match self.backend.caption(image, model).await {
                Ok(caption) => {
                    tracing::info!(
                        "Model {model} returned caption of length {}",
                        caption.len()
                    );
                    return Ok(Acquisition {
                        caption,
                        model: model.to_string(),
                        failures,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                }
                Err(error) => {
                    tracing::warn!("Model {model} failed: {error}");
                    failures.push(AttemptFailure {
                        model: model.to_string(),
                        error,
                    });
                }
            }
        }

        let failure = AggregateFailure { attempts: failures };
        tracing::error!("{failure}");
        Err(AnalyzerError::AllCandidatesFailed(failure))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::types::BackendKind;

    /// Backend answering from a fixed script and recording every call.
    pub(crate) struct ScriptedBackend {
        answers: HashMap<String, Result<String, fn() -> AnalyzerError>>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new() -> Self {
            Self {
                answers: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn ok(mut self, model: &str, caption: &str) -> Self {
            self.answers.insert(model.to_string(), Ok(caption.to_string()));
            self
        }

        pub(crate) fn fail(mut self, model: &str, error: fn() -> AnalyzerError) -> Self {
            self.answers.insert(model.to_string(), Err(error));
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CaptionBackend for ScriptedBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Hosted
        }

        async fn caption(&self, _image: &EncodedImage, model: &str) -> AnalyzerResult<String> {
            self.calls.lock().unwrap().push(model.to_string());
            match self.answers.get(model) {
                Some(Ok(caption)) => Ok(caption.clone()),
                Some(Err(make)) => Err(make()),
                None => Err(AnalyzerError::Backend {
                    status: 404,
                    message: format!("unknown model {model}"),
                }),
            }
        }
    }

    pub(crate) fn tiny_image() -> EncodedImage {
        EncodedImage {
            bytes: vec![0xFF, 0xD8, 0xFF],
            mime: "image/jpeg",
            width: 1,
            height: 1,
        }
    }

    fn timeout() -> AnalyzerError {
        AnalyzerError::Timeout(60)
    }

    fn refused() -> AnalyzerError {
        AnalyzerError::Connection("connection refused".into())
    }

    fn loading() -> AnalyzerError {
        AnalyzerError::ServiceUnavailable {
            status: 503,
            message: "Model is currently loading".into(),
        }
    }

    fn unauthorized() -> AnalyzerError {
        AnalyzerError::Authentication {
            status: 401,
            message: "Invalid credentials".into(),
        }
    }

    #[tokio::test]
    async fn test_primary_success_stops_immediately() {
        let backend = Arc::new(ScriptedBackend::new().ok("a", "a dog").ok("b", "a cat"));
        let acquirer = CaptionAcquirer::new(backend.clone());
        let candidates = ModelCandidates::new("a", ["b"]);

        let result = acquirer.acquire(&tiny_image(), &candidates).await.unwrap();
        assert_eq!(result.caption, "a dog");
        assert_eq!(result.model, "a");
        assert!(result.failures.is_empty());
        assert_eq!(backend.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_falls_back_after_failures() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .fail("a", timeout)
                .fail("b", refused)
                .fail("c", loading)
                .ok("d", "a red bus")
                .ok("e", "never asked"),
        );
        let acquirer = CaptionAcquirer::new(backend.clone());
        let candidates = ModelCandidates::new("a", ["b", "c", "d", "e"]);

        let result = acquirer.acquire(&tiny_image(), &candidates).await.unwrap();
        assert_eq!(result.caption, "a red bus");
        assert_eq!(result.model, "d");
        assert_eq!(result.failures.len(), 3);
        let failed: Vec<_> = result.failures.iter().map(|f| f.model.as_str()).collect();
        assert_eq!(failed, vec!["a", "b", "c"]);
        assert_eq!(backend.calls(), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_all_failing_reports_every_attempt() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .fail("a", unauthorized)
                .fail("b", timeout)
                .fail("c", refused),
        );
        let acquirer = CaptionAcquirer::new(backend.clone());
        let candidates = ModelCandidates::new("a", ["b", "c"]);

        let err = acquirer
            .acquire(&tiny_image(), &candidates)
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("All 3 models failed"));
        assert!(message.contains("Last error: Model c failed: Connection error: connection refused"));

        match err {
            AnalyzerError::AllCandidatesFailed(failure) => {
                assert_eq!(failure.models(), vec!["a", "b", "c"]);
                assert!(matches!(
                    failure.last().map(|a| &a.error),
                    Some(AnalyzerError::Connection(_))
                ));
            }
            other => panic!("expected aggregate failure, got {other:?}"),
        }
        // Each candidate exactly once, no retries.
        assert_eq!(backend.calls(), vec!["a", "b", "c"]);
    }
}
