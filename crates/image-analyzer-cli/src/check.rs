//! Environment readiness check for both backends.

use image_analyzer::backend::local::is_model_installed;
use image_analyzer::config::validate_token;
use image_analyzer::{BackendKind, LocalServerBackend, LocalServerConfig};

use crate::config::Settings;

/// What the check found.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub active_backend: BackendKind,
    pub token_ok: bool,
    pub server_url: String,
    pub server_error: Option<String>,
    pub models: Vec<String>,
    pub local_primary: String,
    pub local_primary_installed: bool,
}

impl CheckReport {
    /// Whether the active backend can be used.
    pub fn ready(&self) -> bool {
        match self.active_backend {
            BackendKind::Hosted => self.token_ok,
            BackendKind::Local => self.server_error.is_none() && self.local_primary_installed,
        }
    }
}

/// Probe the token and the local model server.
pub async fn run_check(settings: &Settings) -> CheckReport {
    let token_ok = validate_token(settings.token.as_deref()).is_ok();

    let local_primary = settings
        .with_backend(BackendKind::Local)
        .candidates()
        .primary()
        .to_string();

    let mut report = CheckReport {
        active_backend: settings.backend,
        token_ok,
        server_url: settings.server_url.clone(),
        server_error: None,
        models: Vec::new(),
        local_primary,
        local_primary_installed: false,
    };

    let backend = LocalServerConfig::new(&settings.server_url)
        .and_then(LocalServerBackend::new);
    let backend = match backend {
        Ok(b) => b,
        Err(e) => {
            report.server_error = Some(e.to_string());
            return report;
        }
    };

    match backend.list_models().await {
        Ok(models) => {
            report.local_primary_installed = is_model_installed(&models, &report.local_primary);
            report.models = models;
        }
        Err(e) => {
            tracing::debug!("Model server check failed: {e}");
            report.server_error = Some(e.to_string());
        }
    }

    report
}

/// Human-readable check output.
pub fn render_check(report: &CheckReport) -> String {
    let mut lines = vec![
        "Image Analyzer Check".to_string(),
        "====================".to_string(),
        String::new(),
        format!("Active backend: {}", report.active_backend),
        String::new(),
    ];

    if report.token_ok {
        lines.push("[OK] HUGGINGFACE_TOKEN is set".to_string());
    } else {
        lines.push("[!!] HUGGINGFACE_TOKEN missing or placeholder (needed for hosted backend)".to_string());
    }

    match &report.server_error {
        None => {
            lines.push(format!("[OK] Model server reachable at {}", report.server_url));
            lines.push(format!("     Available models: {}", report.models.len()));
            if report.local_primary_installed {
                lines.push(format!("[OK] {} found", report.local_primary));
            } else {
                lines.push(format!("[!!] {} not found", report.local_primary));
                lines.push(format!("     Run: ollama pull {}", report.local_primary));
            }
        }
        Some(err) => {
            lines.push(format!(
                "[!!] Cannot reach model server at {}: {err}",
                report.server_url
            ));
            lines.push("     Make sure it is running: ollama serve".to_string());
        }
    }

    lines.push(String::new());
    lines.push(if report.ready() {
        "Status: READY".to_string()
    } else {
        "Status: NOT READY".to_string()
    });
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use image_analyzer::ModelCandidates;

    use super::*;

    fn report(backend: BackendKind) -> CheckReport {
        CheckReport {
            active_backend: backend,
            token_ok: false,
            server_url: "http://localhost:11434".into(),
            server_error: None,
            models: vec!["moondream:latest".into()],
            local_primary: ModelCandidates::local_default().primary().to_string(),
            local_primary_installed: true,
        }
    }

    #[test]
    fn test_ready_depends_on_active_backend() {
        assert!(report(BackendKind::Local).ready());
        assert!(!report(BackendKind::Hosted).ready());
    }

    #[test]
    fn test_render_unreachable_server() {
        let mut r = report(BackendKind::Local);
        r.server_error = Some("Connection error: refused".into());
        let text = render_check(&r);
        assert!(text.contains("[!!] Cannot reach model server"));
        assert!(text.ends_with("Status: NOT READY"));
    }

    #[test]
    fn test_render_missing_model() {
        let mut r = report(BackendKind::Local);
        r.local_primary_installed = false;
        let text = render_check(&r);
        assert!(text.contains("Run: ollama pull moondream:latest"));
    }
}
