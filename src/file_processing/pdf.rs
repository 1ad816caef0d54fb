//! PDF text extraction provider.
//!
//! Uses lopdf to walk the page tree and extract text page by page, so the
//! page cap is honored without decoding the rest of the document.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::provider::{ExtractedText, ExtractionError, TextExtractor, join_page_texts};

/// lopdf-based extractor for PDF documents.
#[derive(Debug, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self
    }
}

/// Parse the document and extract text from its first `max_pages` pages.
fn extract_pages(path: &Path, max_pages: usize) -> Result<ExtractedText, ExtractionError> {
    let doc = lopdf::Document::load(path).map_err(|e| ExtractionError::Parse(e.to_string()))?;

    let pages = doc.get_pages();
    let total_pages = pages.len();
    let pages_read = total_pages.min(max_pages);

    tracing::debug!(
        path = %path.display(),
        total_pages,
        pages_read,
        "Reading PDF pages"
    );

    let texts = pages.keys().take(pages_read).filter_map(|&page_num| {
        match doc.extract_text(&[page_num]) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    page = page_num,
                    error = %e,
                    "No extractable text on page"
                );
                None
            }
        }
    });

    Ok(ExtractedText {
        text: join_page_texts(texts),
        total_pages,
        pages_read,
    })
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(
        &self,
        path: &Path,
        max_pages: usize,
    ) -> Result<ExtractedText, ExtractionError> {
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        if !self.supports_mime_type(&mime_type) {
            return Err(ExtractionError::UnsupportedType(format!(
                "{} is {mime_type}, expected application/pdf",
                path.display()
            )));
        }

        // Surface a missing file as an I/O error rather than a parse error.
        tokio::fs::metadata(path).await?;

        let path_buf: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || extract_pages(&path_buf, max_pages))
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))?
    }

    fn supports_mime_type(&self, mime_type: &str) -> bool {
        mime_type == "application/pdf"
    }

    fn provider_name(&self) -> &'static str {
        "lopdf"
    }
}
