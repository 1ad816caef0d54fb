//! Core trait and types for text extraction backends.

use async_trait::async_trait;
use std::path::Path;

/// Default number of pages read from a single document.
pub const DEFAULT_MAX_PAGES: usize = 50;

/// Separator placed between the text of consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Text extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    /// Page texts joined by [`PAGE_SEPARATOR`].
    pub text: String,
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages visited, `min(total_pages, max_pages)`.
    pub pages_read: usize,
}

impl ExtractedText {
    /// Whether nothing usable was extracted.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Number of characters extracted.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Errors that can occur during extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The file type is not supported by this backend.
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    /// The document could not be parsed.
    #[error("Failed to parse document: {0}")]
    Parse(String),

    /// An I/O error occurred while reading the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking extraction task did not complete.
    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Trait for text extraction backends.
#[async_trait]
pub trait TextExtractor: Send + Sync + std::fmt::Debug {
    /// Extract text from at most `max_pages` pages of the document at `path`.
    ///
    /// Pages without text are skipped. An unreadable or unparsable document
    /// is an error; a parsable document without text is an empty result.
    async fn extract(&self, path: &Path, max_pages: usize)
    -> Result<ExtractedText, ExtractionError>;

    /// Check if this backend handles the given MIME type.
    fn supports_mime_type(&self, mime_type: &str) -> bool;

    /// Backend name for logging.
    fn provider_name(&self) -> &'static str;
}

/// Join page texts in order, dropping pages that carry no text.
pub fn join_page_texts<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages
        .into_iter()
        .filter(|p| !p.as_ref().trim().is_empty())
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}
