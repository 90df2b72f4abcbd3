//! Captioning backends and shared HTTP error classification.

pub mod hosted;
pub mod local;

pub use hosted::HostedBackend;
pub use local::LocalServerBackend;

use async_trait::async_trait;

use crate::capture::EncodedImage;
use crate::types::{AnalyzerError, AnalyzerResult, BackendKind};

/// Longest slice of a response body kept in error messages.
const MAX_ERROR_BODY: usize = 500;

/// An inference service that turns an image into a caption.
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Caption `image` with `model`. One request, no retries.
    async fn caption(&self, image: &EncodedImage, model: &str) -> AnalyzerResult<String>;
}

/// Map a transport-level reqwest failure to an error kind.
pub(crate) fn classify_transport(err: reqwest::Error, timeout_secs: u64) -> AnalyzerError {
    if err.is_timeout() {
        AnalyzerError::Timeout(timeout_secs)
    } else if err.is_connect() {
        AnalyzerError::Connection(err.to_string())
    } else if err.is_decode() {
        AnalyzerError::UnexpectedResponse(err.to_string())
    } else {
        AnalyzerError::Connection(err.to_string())
    }
}

/// Map a non-success HTTP status and its message to an error kind.
pub(crate) fn classify_status(status: u16, message: String) -> AnalyzerError {
    let lower = message.to_lowercase();
    match status {
        401 | 403 => AnalyzerError::Authentication { status, message },
        429 => AnalyzerError::RateLimited(message),
        503 => AnalyzerError::ServiceUnavailable { status, message },
        _ if lower.contains("rate limit") => AnalyzerError::RateLimited(message),
        _ if lower.contains("currently loading") => {
            AnalyzerError::ServiceUnavailable { status, message }
        }
        _ => AnalyzerError::Backend { status, message },
    }
}

/// Pull a readable message out of an error body.
///
/// Prefers a JSON `error` field, otherwise the truncated raw body.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = value.get("error").and_then(|e| e.as_str()) {
            return msg.to_string();
        }
    }
    truncate(body.trim())
}

pub(crate) fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut out: String = body.chars().take(MAX_ERROR_BODY).collect();
    out.push('…');
    out
}
