//! Rendering of analysis outcomes for the terminal.

use chrono::{DateTime, Utc};
use serde::Serialize;

use image_analyzer::report::{error_kind, render_outcome};
use image_analyzer::{
    AnalysisReport, AnalyzerError, AnalyzerResult, AttemptFailure, BackendKind, ModelCandidates,
};

#[derive(Debug, Serialize)]
pub struct FailedAttempt {
    pub model: String,
    pub kind: &'static str,
    pub error: String,
}

/// Machine-readable form of a successful analysis.
#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub request_id: String,
    pub backend: BackendKind,
    pub model: String,
    pub summary: String,
    pub elements: String,
    /// Sorted for stable output; detection itself is unordered.
    pub objects: Vec<String>,
    pub failed_attempts: Vec<FailedAttempt>,
    pub original_size: [u32; 2],
    pub submitted_size: [u32; 2],
    pub elapsed_ms: u64,
    pub analyzed_at: DateTime<Utc>,
}

/// Machine-readable form of a failed analysis.
#[derive(Debug, Serialize)]
pub struct JsonFailure {
    pub backend: BackendKind,
    pub error_kind: &'static str,
    pub error: String,
    /// Every candidate tried before giving up; empty unless all candidates failed.
    pub attempts: Vec<FailedAttempt>,
    pub elements: String,
    pub summary: String,
}

impl FailedAttempt {
    fn from_failure(failure: &AttemptFailure) -> Self {
        Self {
            model: failure.model.clone(),
            kind: error_kind(&failure.error),
            error: failure.error.to_string(),
        }
    }
}

impl JsonReport {
    pub fn new(report: &AnalysisReport, backend: BackendKind) -> Self {
        let mut objects: Vec<String> = report.analysis.objects.iter().cloned().collect();
        objects.sort();

        Self {
            request_id: report.request_id.clone(),
            backend,
            model: report.model.clone(),
            summary: report.analysis.summary.clone(),
            elements: report.analysis.elements_markdown.clone(),
            objects,
            failed_attempts: report.failures.iter().map(FailedAttempt::from_failure).collect(),
            original_size: [report.original_size.0, report.original_size.1],
            submitted_size: [report.submitted_size.0, report.submitted_size.1],
            elapsed_ms: report.elapsed_ms,
            analyzed_at: Utc::now(),
        }
    }
}

/// Render an outcome as human-readable text.
pub fn render_text(outcome: &AnalyzerResult<AnalysisReport>) -> String {
    let rendered = render_outcome(outcome);
    match outcome {
        Ok(report) => {
            let mut out = format!("{}\n\nGeneral Summary:\n{}\n", rendered.elements, rendered.summary);
            out.push_str(&format!("\nModel: {}", report.model));
            if !report.failures.is_empty() {
                out.push_str(&format!(
                    " (after {} failed attempt{})",
                    report.failures.len(),
                    if report.failures.len() == 1 { "" } else { "s" }
                ));
            }
            if report.original_size != report.submitted_size {
                out.push_str(&format!(
                    "\nResized: {}x{} -> {}x{}",
                    report.original_size.0,
                    report.original_size.1,
                    report.submitted_size.0,
                    report.submitted_size.1
                ));
            }
            out.push_str(&format!("\nTime: {}ms", report.elapsed_ms));
            out
        }
        Err(_) => rendered.elements,
    }
}

/// Render an outcome as pretty JSON.
pub fn render_json(
    outcome: &AnalyzerResult<AnalysisReport>,
    backend: BackendKind,
) -> serde_json::Result<String> {
    match outcome {
        Ok(report) => serde_json::to_string_pretty(&JsonReport::new(report, backend)),
        Err(err) => {
            let rendered = render_outcome(outcome);
            let attempts = match err {
                AnalyzerError::AllCandidatesFailed(failure) => {
                    failure.attempts.iter().map(FailedAttempt::from_failure).collect()
                }
                _ => Vec::new(),
            };
            serde_json::to_string_pretty(&JsonFailure {
                backend,
                error_kind: error_kind(err),
                error: err.to_string(),
                attempts,
                elements: rendered.elements,
                summary: rendered.summary,
            })
        }
    }
}

/// Numbered candidate list.
pub fn render_candidates(backend: BackendKind, candidates: &ModelCandidates) -> String {
    let mut out = format!("Candidate models ({backend} backend):\n");
    for (i, model) in candidates.iter().enumerate() {
        let role = if i == 0 { "primary" } else { "fallback" };
        out.push_str(&format!("  {}. {model:<44} {role}\n", i + 1));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use image_analyzer::{AggregateFailure, Analysis};

    use super::*;

    fn report() -> AnalysisReport {
        AnalysisReport {
            request_id: "req-1".into(),
            analysis: Analysis {
                summary: "a dog".into(),
                elements_markdown: "**AI Description:**\na dog\n\n**Detected Objects:**\n• Dog"
                    .into(),
                objects: ["Dog".to_string()].into_iter().collect::<HashSet<_>>(),
            },
            model: "fallback/model".into(),
            failures: vec![AttemptFailure {
                model: "primary/model".into(),
                error: AnalyzerError::Timeout(60),
            }],
            original_size: (12_000, 6_000),
            submitted_size: (5_000, 2_500),
            elapsed_ms: 42,
        }
    }

    #[test]
    fn test_text_success() {
        let text = render_text(&Ok(report()));
        assert!(text.starts_with("**AI Description:**\na dog"));
        assert!(text.contains("General Summary:\na dog"));
        assert!(text.contains("Model: fallback/model (after 1 failed attempt)"));
        assert!(text.contains("Resized: 12000x6000 -> 5000x2500"));
    }

    #[test]
    fn test_text_failure_is_annotated() {
        let text = render_text(&Err(AnalyzerError::MissingToken));
        assert!(text.contains("Setup Required"));
    }

    #[test]
    fn test_json_success() {
        let json = render_json(&Ok(report()), BackendKind::Hosted).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["backend"], "hosted");
        assert_eq!(value["model"], "fallback/model");
        assert_eq!(value["objects"], serde_json::json!(["Dog"]));
        assert_eq!(value["failed_attempts"][0]["kind"], "timeout");
        assert_eq!(value["submitted_size"], serde_json::json!([5000, 2500]));
    }

    #[test]
    fn test_json_failure() {
        let json = render_json(
            &Err(AnalyzerError::Connection("refused".into())),
            BackendKind::Local,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["error_kind"], "connection");
        assert_eq!(value["summary"], "");
        assert_eq!(value["attempts"], serde_json::json!([]));
    }

    #[test]
    fn test_json_failure_lists_every_attempt() {
        let err = AnalyzerError::AllCandidatesFailed(AggregateFailure {
            attempts: vec![
                AttemptFailure {
                    model: "first".into(),
                    error: AnalyzerError::Timeout(60),
                },
                AttemptFailure {
                    model: "second".into(),
                    error: AnalyzerError::RateLimited("slow down".into()),
                },
            ],
        });
        let json = render_json(&Err(err), BackendKind::Hosted).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["error_kind"], "all_candidates_failed");
        let attempts = value["attempts"].as_array().unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0]["model"], "first");
        assert_eq!(attempts[0]["kind"], "timeout");
        assert_eq!(attempts[1]["model"], "second");
        assert_eq!(attempts[1]["kind"], "rate_limited");
    }

    #[test]
    fn test_candidates_listing() {
        let text = render_candidates(BackendKind::Local, &ModelCandidates::local_default());
        assert!(text.contains("1. moondream:latest"));
        assert!(text.contains("fallback"));
    }
}
