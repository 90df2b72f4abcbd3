//! The full pipeline: prepare, encode, caption, format.

use std::time::Instant;

use image::DynamicImage;
use tracing::Instrument;

use crate::acquirer::CaptionAcquirer;
use crate::capture::{encode_image, prepare_image};
use crate::formatter::{format_analysis, ObjectVocabulary};
use crate::types::{AnalysisReport, AnalyzerResult, BackendKind, ModelCandidates};

/// Runs one image through a backend and the keyword formatter.
///
/// Holds no per-request state, so one instance can serve many requests.
#[derive(Clone)]
pub struct ImageAnalyzer {
    acquirer: CaptionAcquirer,
    candidates: ModelCandidates,
    vocabulary: &'static ObjectVocabulary,
}

impl ImageAnalyzer {
    pub fn new(acquirer: CaptionAcquirer, candidates: ModelCandidates) -> Self {
        Self {
            acquirer,
            candidates,
            vocabulary: ObjectVocabulary::common(),
        }
    }

    pub fn candidates(&self) -> &ModelCandidates {
        &self.candidates
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.acquirer.backend().kind()
    }

    /// Analyze a decoded image.
    pub async fn analyze(&self, image: DynamicImage) -> AnalyzerResult<AnalysisReport> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("analyze", request_id = %request_id);
        self.run(image, request_id).instrument(span).await
    }

    async fn run(&self, image: DynamicImage, request_id: String) -> AnalyzerResult<AnalysisReport> {
        let start = Instant::now();
        tracing::info!("Starting image analysis ({} backend)", self.backend_kind());

        let prepared = prepare_image(image);
        let encoded = encode_image(&prepared)?;
        tracing::info!(
            "Final image details: size={}x{}, mode=RGB",
            encoded.width,
            encoded.height
        );

        let acquisition = self.acquirer.acquire(&encoded, &self.candidates).await?;
        let analysis = format_analysis(&acquisition.caption, self.vocabulary);

        tracing::info!(
            "Analysis completed: model={}, objects={}, summary length={}",
            acquisition.model,
            analysis.objects.len(),
            analysis.summary.len()
        );

        Ok(AnalysisReport {
            request_id,
            analysis,
            model: acquisition.model,
            failures: acquisition.failures,
            original_size: prepared.original_size,
            submitted_size: (encoded.width, encoded.height),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}
