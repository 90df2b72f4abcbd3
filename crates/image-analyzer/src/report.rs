//! Conversion of pipeline outcomes into what the user sees.

use serde::Serialize;

use crate::types::{AnalysisReport, AnalyzerError, AnalyzerResult};

/// Shown when a request arrives without an image.
pub const NO_IMAGE_MESSAGE: &str = "Please upload an image first.";

/// The two panes shown to the user. Never an error.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedOutput {
    pub elements: String,
    pub summary: String,
}

impl RenderedOutput {
    pub fn message(elements: impl Into<String>) -> Self {
        Self {
            elements: elements.into(),
            summary: String::new(),
        }
    }
}

/// Render a pipeline result; errors become annotated messages.
pub fn render_outcome(outcome: &AnalyzerResult<AnalysisReport>) -> RenderedOutput {
    match outcome {
        Ok(report) => RenderedOutput {
            elements: report.analysis.elements_markdown.clone(),
            summary: report.analysis.summary.clone(),
        },
        Err(err) => {
            tracing::error!("Analysis failed: {err}");
            RenderedOutput::message(user_message(err))
        }
    }
}

/// Short machine-readable name of an error kind.
pub fn error_kind(err: &AnalyzerError) -> &'static str {
    match err {
        AnalyzerError::Configuration(_) | AnalyzerError::MissingToken => "configuration",
        AnalyzerError::Connection(_) => "connection",
        AnalyzerError::Timeout(_) => "timeout",
        AnalyzerError::Authentication { .. } => "authentication",
        AnalyzerError::ServiceUnavailable { .. } => "service_unavailable",
        AnalyzerError::RateLimited(_) => "rate_limited",
        AnalyzerError::Backend { .. } => "backend",
        AnalyzerError::UnexpectedResponse(_) => "unexpected_response",
        AnalyzerError::AllCandidatesFailed(_) => "all_candidates_failed",
        AnalyzerError::Image(_) => "image",
        AnalyzerError::Io(_) => "io",
        AnalyzerError::InvalidInput(_) => "invalid_input",
    }
}

/// Annotated, user-facing message for an error.
///
/// For an aggregate failure the last attempt decides the category, since
/// that is the error it reports.
pub fn user_message(err: &AnalyzerError) -> String {
    if let Some(msg) = category_message(err) {
        return msg;
    }
    match err {
        AnalyzerError::AllCandidatesFailed(failure) => {
            if let Some(msg) = failure.last().and_then(|last| category_message(&last.error)) {
                return msg;
            }
            format!("❌ **Model Error**: {err}. Check the log for detailed error information.")
        }
        AnalyzerError::Image(_) => format!("❌ **Error**: Unsupported image format ({err})"),
        AnalyzerError::InvalidInput(detail) => format!("❌ **Error**: {detail}"),
        _ => format!("❌ **Unexpected Error**: {err}. Check the log for details."),
    }
}

fn category_message(err: &AnalyzerError) -> Option<String> {
    let msg = match err {
        AnalyzerError::MissingToken => "⚠️ **Setup Required**: Please add your Hugging Face token \
            to the .env file as HUGGINGFACE_TOKEN=hf_..."
            .to_string(),
        AnalyzerError::Configuration(detail) => format!("❌ **Configuration Error**: {detail}"),
        AnalyzerError::Authentication { .. } => {
            "⚠️ **Authentication Error**: Invalid Hugging Face token. Please verify your token."
                .to_string()
        }
        AnalyzerError::ServiceUnavailable { .. } => {
            "⚠️ **Service Error**: Model is loading. Please try again in a few moments.".to_string()
        }
        AnalyzerError::RateLimited(_) => {
            "⚠️ **Rate Limit**: Too many requests. Please wait before trying again.".to_string()
        }
        _ => return None,
    };
    Some(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AggregateFailure, AttemptFailure};

    fn aggregate(last: AnalyzerError) -> AnalyzerError {
        AnalyzerError::AllCandidatesFailed(AggregateFailure {
            attempts: vec![
                AttemptFailure {
                    model: "a".into(),
                    error: AnalyzerError::Timeout(60),
                },
                AttemptFailure {
                    model: "b".into(),
                    error: last,
                },
            ],
        })
    }

    #[test]
    fn test_missing_token_message() {
        assert!(user_message(&AnalyzerError::MissingToken).contains("Setup Required"));
    }

    #[test]
    fn test_aggregate_uses_last_attempt_category() {
        let err = aggregate(AnalyzerError::Authentication {
            status: 401,
            message: "nope".into(),
        });
        assert!(user_message(&err).contains("Authentication Error"));

        let err = aggregate(AnalyzerError::RateLimited("slow".into()));
        assert!(user_message(&err).contains("Rate Limit"));

        let err = aggregate(AnalyzerError::ServiceUnavailable {
            status: 503,
            message: "loading".into(),
        });
        assert!(user_message(&err).contains("Service Error"));
    }

    #[test]
    fn test_aggregate_generic_message_embeds_last_error() {
        let err = aggregate(AnalyzerError::Connection("refused".into()));
        let msg = user_message(&err);
        assert!(msg.starts_with("❌ **Model Error**: All 2 models failed"));
        assert!(msg.contains("Model b failed: Connection error: refused"));
    }

    #[test]
    fn test_unexpected_error() {
        let msg = user_message(&AnalyzerError::Timeout(60));
        assert!(msg.starts_with("❌ **Unexpected Error**"));
    }

    #[test]
    fn test_render_error_has_empty_summary() {
        let rendered = render_outcome(&Err(AnalyzerError::MissingToken));
        assert!(rendered.summary.is_empty());
        assert!(rendered.elements.contains("Setup Required"));
    }
}
