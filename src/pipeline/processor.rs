//! Per-document pipeline: extract, summarize, compose and send.

use std::sync::Arc;

use super::Document;
use crate::file_processing::{ExtractionError, TextExtractor};
use crate::llm::{SummarizeError, Summarizer, Summary, ensure_summarizable};
use crate::mail::{ComposeError, ComposeRequest, DeliveryError, MailTransport, MessageComposer};

/// Processing stage a document can fail at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Summarize,
    Send,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extract => write!(f, "extract"),
            Self::Summarize => write!(f, "summarize"),
            Self::Send => write!(f, "send"),
        }
    }
}

/// Why a single document failed.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Text extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("No text could be extracted")]
    EmptyText,

    #[error("Summarization failed: {0}")]
    Summarize(#[from] SummarizeError),

    #[error("Message composition failed: {0}")]
    Compose(#[from] ComposeError),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

impl StageError {
    /// Stage the error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Extraction(_) | Self::EmptyText => Stage::Extract,
            Self::Summarize(_) => Stage::Summarize,
            Self::Compose(_) | Self::Delivery(_) => Stage::Send,
        }
    }
}

/// Why delivery was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Email dispatch was switched off for this run.
    Disabled,
    /// No relay or recipients are configured.
    NotConfigured,
}

/// Terminal state of one document.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Summarized and accepted by the relay.
    Delivered(Summary),
    /// Summarized; delivery intentionally skipped.
    Skipped { summary: Summary, reason: SkipReason },
    /// Halted at a stage. `summary` is kept when only delivery failed.
    Failed {
        error: StageError,
        summary: Option<Summary>,
    },
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn summary(&self) -> Option<&Summary> {
        match self {
            Self::Delivered(summary) | Self::Skipped { summary, .. } => Some(summary),
            Self::Failed { summary, .. } => summary.as_ref(),
        }
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Failed { error, .. } => Some(error.stage()),
            _ => None,
        }
    }
}

/// Composer plus the transport that carries its output.
#[derive(Debug, Clone)]
pub struct Delivery {
    composer: MessageComposer,
    transport: Arc<dyn MailTransport>,
}

impl Delivery {
    pub fn new(composer: MessageComposer, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            composer,
            transport,
        }
    }
}

/// Runs one document through every stage, never letting an error escape.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    extractor: Arc<dyn TextExtractor>,
    summarizer: Arc<dyn Summarizer>,
    delivery: Option<Delivery>,
    max_pages: usize,
}

impl DocumentProcessor {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        summarizer: Arc<dyn Summarizer>,
        max_pages: usize,
    ) -> Self {
        Self {
            extractor,
            summarizer,
            delivery: None,
            max_pages,
        }
    }

    #[must_use]
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn can_deliver(&self) -> bool {
        self.delivery.is_some()
    }

    /// Process `doc`. With `send_email` false the summary is returned instead
    /// of delivered.
    pub async fn process(&self, doc: &Document, send_email: bool) -> ProcessOutcome {
        let file = doc.display_name.as_str();

        let extracted = match self.extractor.extract(&doc.path, self.max_pages).await {
            Ok(extracted) if extracted.is_empty() => return fail(doc, StageError::EmptyText, None),
            Ok(extracted) => extracted,
            Err(e) => return fail(doc, e.into(), None),
        };
        tracing::info!(
            file,
            extractor = self.extractor.provider_name(),
            total_pages = extracted.total_pages,
            pages_read = extracted.pages_read,
            chars = extracted.char_count(),
            "Text extracted"
        );

        if let Err(e) = ensure_summarizable(&extracted.text) {
            return fail(doc, e.into(), None);
        }

        let summary = match self.summarizer.summarize(&extracted.text, file).await {
            Ok(summary) => summary,
            Err(e) => return fail(doc, e.into(), None),
        };
        tracing::info!(
            file,
            model = %summary.usage.model,
            prompt_tokens = summary.usage.prompt_tokens,
            completion_tokens = summary.usage.completion_tokens,
            total_tokens = summary.usage.total_tokens,
            "Summary generated"
        );

        let delivery = match (&self.delivery, send_email) {
            (_, false) => return skip(doc, summary, SkipReason::Disabled),
            (None, true) => return skip(doc, summary, SkipReason::NotConfigured),
            (Some(delivery), true) => delivery,
        };

        let attachments = [doc.path.clone()];
        let request = ComposeRequest {
            filename: file,
            size_bytes: doc.size_bytes,
            summary: &summary.content,
            usage: Some(&summary.usage),
            attachments: &attachments,
        };
        let message = match delivery.composer.compose(&request).await {
            Ok(message) => message,
            Err(e) => return fail(doc, e.into(), Some(summary)),
        };

        match delivery.transport.send(&message).await {
            Ok(()) => {
                tracing::info!(
                    file,
                    transport = delivery.transport.transport_name(),
                    recipients = message.to.len(),
                    "Summary delivered"
                );
                ProcessOutcome::Delivered(summary)
            }
            Err(e) => fail(doc, e.into(), Some(summary)),
        }
    }
}

fn fail(doc: &Document, error: StageError, summary: Option<Summary>) -> ProcessOutcome {
    tracing::error!(
        file = %doc.display_name,
        stage = %error.stage(),
        error = %error,
        "Document failed"
    );
    ProcessOutcome::Failed { error, summary }
}

fn skip(doc: &Document, summary: Summary, reason: SkipReason) -> ProcessOutcome {
    match reason {
        SkipReason::Disabled => {
            tracing::info!(file = %doc.display_name, "Email disabled, summary not sent");
        }
        SkipReason::NotConfigured => {
            tracing::warn!(file = %doc.display_name, "No mail relay configured, summary not sent");
        }
    }
    ProcessOutcome::Skipped { summary, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::DeliveryErrorKind;
    use crate::pipeline::testing::{
        FakeExtractor, FakePage, FakeSummarizer, FakeTransport, document, long_text,
    };

    fn composer() -> MessageComposer {
        MessageComposer::new(
            "bot@example.com",
            &["ops@example.com".to_string()],
            "Summary: {filename}",
        )
        .unwrap()
    }

    fn processor(
        extractor: FakeExtractor,
        summarizer: &Arc<FakeSummarizer>,
        transport: Option<&Arc<FakeTransport>>,
    ) -> DocumentProcessor {
        let summarizer: Arc<dyn Summarizer> = Arc::<FakeSummarizer>::clone(summarizer);
        let processor = DocumentProcessor::new(Arc::new(extractor), summarizer, 50);
        match transport {
            Some(t) => {
                let transport: Arc<dyn MailTransport> = Arc::<FakeTransport>::clone(t);
                processor.with_delivery(Delivery::new(composer(), transport))
            }
            None => processor,
        }
    }

    #[tokio::test]
    async fn test_delivers_summary() {
        let summarizer = Arc::new(FakeSummarizer::default());
        let transport = Arc::new(FakeTransport::default());
        let extractor = FakeExtractor::default().with("report.pdf", FakePage::Text(long_text("q3")));

        let outcome = processor(extractor, &summarizer, Some(&transport))
            .process(&document("report.pdf"), true)
            .await;

        assert!(matches!(outcome, ProcessOutcome::Delivered(_)));
        assert_eq!(summarizer.call_count(), 1);
        assert_eq!(transport.sent_subjects(), vec!["Summary: report.pdf"]);
    }

    #[tokio::test]
    async fn test_extraction_error_fails_extract_stage() {
        let summarizer = Arc::new(FakeSummarizer::default());
        let extractor = FakeExtractor::default().with("bad.pdf", FakePage::Fail);

        let outcome = processor(extractor, &summarizer, None)
            .process(&document("bad.pdf"), false)
            .await;

        assert_eq!(outcome.failed_stage(), Some(Stage::Extract));
        assert_eq!(summarizer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_text_fails_extract_stage() {
        let summarizer = Arc::new(FakeSummarizer::default());
        let extractor = FakeExtractor::default().with("scan.pdf", FakePage::Text(" \n\n ".into()));

        let outcome = processor(extractor, &summarizer, None)
            .process(&document("scan.pdf"), false)
            .await;

        assert!(matches!(
            outcome,
            ProcessOutcome::Failed {
                error: StageError::EmptyText,
                ..
            }
        ));
        assert_eq!(summarizer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_short_text_never_reaches_summarizer() {
        let summarizer = Arc::new(FakeSummarizer::default());
        let extractor =
            FakeExtractor::default().with("memo.pdf", FakePage::Text("Just a title page.".into()));

        let outcome = processor(extractor, &summarizer, None)
            .process(&document("memo.pdf"), false)
            .await;

        assert_eq!(outcome.failed_stage(), Some(Stage::Summarize));
        assert_eq!(summarizer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_summarizer_error_fails_summarize_stage() {
        let summarizer = Arc::new(FakeSummarizer::failing());
        let extractor = FakeExtractor::default().with("a.pdf", FakePage::Text(long_text("a")));

        let outcome = processor(extractor, &summarizer, None)
            .process(&document("a.pdf"), false)
            .await;

        assert_eq!(outcome.failed_stage(), Some(Stage::Summarize));
        assert_eq!(summarizer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_auth_rejection_fails_send_but_keeps_summary() {
        let summarizer = Arc::new(FakeSummarizer::default());
        let transport = Arc::new(FakeTransport::rejecting());
        let extractor = FakeExtractor::default().with("a.pdf", FakePage::Text(long_text("a")));

        let outcome = processor(extractor, &summarizer, Some(&transport))
            .process(&document("a.pdf"), true)
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.failed_stage(), Some(Stage::Send));
        assert_eq!(outcome.summary().unwrap().content, "Summary of a.pdf");
        match outcome {
            ProcessOutcome::Failed {
                error: StageError::Delivery(e),
                ..
            } => assert_eq!(e.kind(), DeliveryErrorKind::Authentication),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_email_disabled_surfaces_summary() {
        let summarizer = Arc::new(FakeSummarizer::default());
        let transport = Arc::new(FakeTransport::rejecting());
        let extractor = FakeExtractor::default().with("a.pdf", FakePage::Text(long_text("a")));

        let outcome = processor(extractor, &summarizer, Some(&transport))
            .process(&document("a.pdf"), false)
            .await;

        assert!(outcome.is_success());
        assert!(matches!(
            outcome,
            ProcessOutcome::Skipped {
                reason: SkipReason::Disabled,
                ..
            }
        ));
        assert_eq!(outcome.summary().unwrap().content, "Summary of a.pdf");
    }

    #[tokio::test]
    async fn test_missing_relay_is_success() {
        let summarizer = Arc::new(FakeSummarizer::default());
        let extractor = FakeExtractor::default().with("a.pdf", FakePage::Text(long_text("a")));

        let outcome = processor(extractor, &summarizer, None)
            .process(&document("a.pdf"), true)
            .await;

        assert!(matches!(
            outcome,
            ProcessOutcome::Skipped {
                reason: SkipReason::NotConfigured,
                ..
            }
        ));
    }
}
