//! HTTP front end: JSON image upload, bearer auth, and /health.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use image_analyzer::report::{error_kind, render_outcome, user_message, NO_IMAGE_MESSAGE};
use image_analyzer::{load_from_base64, AnalyzerError, ImageAnalyzer};

/// Largest accepted request body (base64 inflates images by a third).
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Shared server state passed to all handlers via axum State.
pub struct ServerState {
    pub analyzer: ImageAnalyzer,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64 image data, optionally as a `data:` URL.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub elements: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl AnalyzeResponse {
    fn failure(elements: String, kind: &'static str) -> Self {
        Self {
            elements,
            summary: String::new(),
            request_id: None,
            model: None,
            objects: None,
            error: Some(kind),
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/v1/analyze", post(handle_analyze))
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP server on the given address.
pub async fn serve(addr: &str, state: Arc<ServerState>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Auth middleware: checks the bearer token if one is configured.
/// /health is handled by a separate route that bypasses this layer.
async fn auth_layer(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: middleware::Next,
) -> Response {
    if let Some(expected) = &state.token {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(AnalyzeResponse::failure("Unauthorized".to_string(), "unauthorized")),
            )
                .into_response();
        }
    }

    next.run(request).await
}

/// Split a `data:image/png;base64,...` URL into MIME type and payload.
fn split_data_url(raw: &str) -> (Option<&str>, &str) {
    if let Some(rest) = raw.strip_prefix("data:") {
        if let Some((meta, payload)) = rest.split_once(',') {
            let mime = meta.split(';').next().filter(|m| !m.is_empty());
            return (mime, payload);
        }
    }
    (None, raw)
}

fn status_for(err: &AnalyzerError) -> StatusCode {
    match err {
        AnalyzerError::Image(_) | AnalyzerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AnalyzerError::AllCandidatesFailed(_)
        | AnalyzerError::Connection(_)
        | AnalyzerError::Timeout(_)
        | AnalyzerError::Authentication { .. }
        | AnalyzerError::ServiceUnavailable { .. }
        | AnalyzerError::RateLimited(_)
        | AnalyzerError::Backend { .. }
        | AnalyzerError::UnexpectedResponse(_) => StatusCode::BAD_GATEWAY,
        AnalyzerError::Configuration(_) | AnalyzerError::MissingToken | AnalyzerError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn handle_analyze(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<AnalyzeRequest>,
) -> (StatusCode, Json<AnalyzeResponse>) {
    let raw = match body.image.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            tracing::warn!("Analyze request without image data");
            return (
                StatusCode::BAD_REQUEST,
                Json(AnalyzeResponse::failure(NO_IMAGE_MESSAGE.to_string(), "no_image")),
            );
        }
    };

    let (data_mime, payload) = split_data_url(raw);
    let mime = body.mime.as_deref().or(data_mime).unwrap_or("");

    let image = match load_from_base64(payload, mime) {
        Ok((image, _source)) => image,
        Err(err) => {
            return (
                status_for(&err),
                Json(AnalyzeResponse::failure(user_message(&err), error_kind(&err))),
            );
        }
    };

    let outcome = state.analyzer.analyze(image).await;
    let rendered = render_outcome(&outcome);

    match outcome {
        Ok(report) => {
            let mut objects: Vec<String> = report.analysis.objects.into_iter().collect();
            objects.sort();
            (
                StatusCode::OK,
                Json(AnalyzeResponse {
                    elements: rendered.elements,
                    summary: rendered.summary,
                    request_id: Some(report.request_id),
                    model: Some(report.model),
                    objects: Some(objects),
                    error: None,
                }),
            )
        }
        Err(err) => (
            status_for(&err),
            Json(AnalyzeResponse::failure(rendered.elements, error_kind(&err))),
        ),
    }
}

/// Health check endpoint, no auth required.
async fn handle_health(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.analyzer.backend_kind(),
        "models": state.analyzer.candidates().iter().collect::<Vec<_>>(),
    }))
}
