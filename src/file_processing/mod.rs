//! Document text extraction.
//!
//! The pipeline talks to extraction backends through the [`TextExtractor`]
//! trait. Backends are selected once at startup by [`ExtractorFactory`]; an
//! unknown backend is a configuration error, never a runtime branch.
//!
//! # Providers
//!
//! - [`PdfTextExtractor`] - lopdf-based page-by-page extraction (default)
//!
//! # Usage
//!
//! ```rust,ignore
//! use pdf_summary_mailer::file_processing::{ExtractorFactory, TextExtractor};
//!
//! let extractor = ExtractorFactory::create(&config.processing)?;
//! let extracted = extractor.extract(Path::new("report.pdf"), 50).await?;
//! println!("{} of {} pages", extracted.pages_read, extracted.total_pages);
//! ```

mod factory;
mod pdf;
mod provider;

pub use factory::ExtractorFactory;
pub use pdf::PdfTextExtractor;
pub use provider::{
    DEFAULT_MAX_PAGES, ExtractedText, ExtractionError, PAGE_SEPARATOR, TextExtractor,
    join_page_texts,
};
