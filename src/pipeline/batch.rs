//! Batch discovery and sequential processing.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use futures::FutureExt;
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;
use walkdir::WalkDir;

use super::document::is_pdf_path;
use super::{Document, DocumentProcessor, PacingPolicy, ProcessOutcome};

/// Input absence errors, raised before any document is processed.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("File not found: {path}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

impl BatchStats {
    pub fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.success += 1;
        } else {
            self.failed += 1;
        }
    }
}

impl std::fmt::Display for BatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total: {}, success: {}, failed: {}",
            self.total, self.success, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Process at most this many of the discovered documents; `0` means no cap.
    pub max_files: Option<usize>,
    /// Deliver summaries by email.
    pub send_email: bool,
}

/// Recursively collect every `.pdf` under `root`, in traversal order.
///
/// Unreadable entries are logged and skipped.
pub fn discover(root: &Path) -> Result<Vec<Document>, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::DirectoryNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_pdf_path(entry.path()) {
            continue;
        }
        match Document::from_path(entry.path()) {
            Ok(doc) => documents.push(doc),
            Err(e) => tracing::warn!(path = %entry.path().display(), error = %e, "Skipping file"),
        }
    }
    Ok(documents)
}

/// Drives a [`DocumentProcessor`] over a list of documents, one at a time.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    processor: DocumentProcessor,
    pacing: PacingPolicy,
}

impl BatchOrchestrator {
    pub fn new(processor: DocumentProcessor, pacing: PacingPolicy) -> Self {
        Self { processor, pacing }
    }

    /// Discover and process every PDF under `root`.
    pub async fn run_directory<F>(
        &self,
        root: &Path,
        options: BatchOptions,
        on_outcome: F,
    ) -> Result<BatchStats, DiscoveryError>
    where
        F: FnMut(&Document, &ProcessOutcome),
    {
        let mut documents = discover(root)?;
        let found = documents.len();
        if let Some(max) = options.max_files.filter(|&max| max > 0) {
            documents.truncate(max);
        }
        tracing::info!(
            root = %root.display(),
            found,
            selected = documents.len(),
            "Discovered PDF files"
        );

        Ok(self.run(&documents, options.send_email, on_outcome).await)
    }

    /// Process a single file.
    pub async fn run_file<F>(
        &self,
        path: &Path,
        send_email: bool,
        on_outcome: F,
    ) -> Result<BatchStats, DiscoveryError>
    where
        F: FnMut(&Document, &ProcessOutcome),
    {
        let document = Document::from_path(path).map_err(|source| DiscoveryError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.run(&[document], send_email, on_outcome).await)
    }

    /// Process `documents` in order, pacing between them.
    ///
    /// A panic inside one document is counted as a failure and the batch
    /// continues with the next.
    pub async fn run<F>(&self, documents: &[Document], send_email: bool, mut on_outcome: F) -> BatchStats
    where
        F: FnMut(&Document, &ProcessOutcome),
    {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("batch", %run_id);

        async {
            let total = documents.len();
            let mut stats = BatchStats::default();
            tracing::info!(total, send_email, "Batch started");

            for (index, doc) in documents.iter().enumerate() {
                tracing::info!(file = %doc.display_name, "[{}/{}] Processing", index + 1, total);

                let result = AssertUnwindSafe(self.processor.process(doc, send_email))
                    .catch_unwind()
                    .await;
                match result {
                    Ok(outcome) => {
                        stats.record(outcome.is_success());
                        on_outcome(doc, &outcome);
                    }
                    Err(panic) => {
                        tracing::error!(
                            file = %doc.display_name,
                            panic = panic_message(panic.as_ref()),
                            "Document processing panicked"
                        );
                        stats.record(false);
                    }
                }

                if index + 1 < total {
                    self.pacing.pause().await;
                }
            }

            tracing::info!(
                total = stats.total,
                success = stats.success,
                failed = stats.failed,
                "Batch finished"
            );
            stats
        }
        .instrument(span)
        .await
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
