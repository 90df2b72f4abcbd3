//! Image Analyzer: caption images through a hosted API or a local model
//! server, with ordered model fallback and keyword-based object extraction.

pub mod acquirer;
pub mod analyzer;
pub mod backend;
pub mod capture;
pub mod config;
pub mod formatter;
pub mod report;
pub mod types;

pub use acquirer::CaptionAcquirer;
pub use analyzer::ImageAnalyzer;
pub use backend::{CaptionBackend, HostedBackend, LocalServerBackend};
pub use capture::{
    downscaled_dimensions, encode_image, is_supported_format, load_from_base64, load_from_bytes,
    load_from_file, prepare_image, EncodedImage, ImageSource, PreparedImage,
};
pub use config::{BackendConfig, HostedConfig, LocalServerConfig};
pub use formatter::{format_analysis, ObjectVocabulary};
pub use report::{render_outcome, user_message, RenderedOutput};
pub use types::*;
