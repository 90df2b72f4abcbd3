//! Glue between resolved settings and the core analyzer.

use std::path::Path;

use image_analyzer::{
    load_from_file, AnalysisReport, AnalyzerError, AnalyzerResult, CaptionAcquirer, ImageAnalyzer,
};

use crate::config::Settings;

/// Validate configuration and build an analyzer for the active backend.
pub fn build_analyzer(settings: &Settings) -> AnalyzerResult<ImageAnalyzer> {
    let backend = settings.backend_config()?.build()?;
    Ok(ImageAnalyzer::new(
        CaptionAcquirer::new(backend),
        settings.candidates(),
    ))
}

/// Load an image file and run it through the pipeline.
pub async fn analyze_file(settings: &Settings, path: &str) -> AnalyzerResult<AnalysisReport> {
    if path.trim().is_empty() {
        return Err(AnalyzerError::InvalidInput(
            image_analyzer::report::NO_IMAGE_MESSAGE.to_string(),
        ));
    }
    if !Path::new(path).is_file() {
        return Err(AnalyzerError::InvalidInput(format!("File not found: {path}")));
    }

    let analyzer = build_analyzer(settings)?;
    tracing::info!("Loading image from path: {path}");
    let (image, _source) = load_from_file(path)?;
    analyzer.analyze(image).await
}
