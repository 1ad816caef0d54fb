//! Factory for creating text extractors based on configuration.

use super::pdf::PdfTextExtractor;
use super::provider::TextExtractor;
use crate::config::{ConfigError, ProcessingConfig};
use std::sync::Arc;

/// Factory for creating text extractors based on configuration.
#[derive(Debug)]
pub struct ExtractorFactory;

impl ExtractorFactory {
    /// Create the extractor named by `processing.extractor`.
    ///
    /// `"lopdf"` and `"auto"` select [`PdfTextExtractor`]; anything else is a
    /// configuration error.
    pub fn create(config: &ProcessingConfig) -> Result<Arc<dyn TextExtractor>, ConfigError> {
        match config.extractor.to_lowercase().as_str() {
            "lopdf" | "auto" => {
                tracing::info!("Using lopdf for PDF text extraction");
                Ok(Arc::new(PdfTextExtractor::new()))
            }
            other => Err(ConfigError::Invalid(format!(
                "unknown text extractor '{other}' (expected 'lopdf')"
            ))),
        }
    }
}
