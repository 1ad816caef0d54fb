#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};

use pdf_summary_mailer::llm::{Summarizer, SummarizeError, Summary, Usage};
use pdf_summary_mailer::mail::{ComposedMessage, DeliveryError, MailTransport};

/// Write a PDF with one page per entry of `pages`, each showing that text.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).unwrap();
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// A sentence comfortably above the summarization threshold.
pub fn long_sentence(topic: &str) -> String {
    format!(
        "Quarterly report on {topic}. Revenue grew steadily across all regions while operating \
         costs remained flat, and the board approved the expansion plan for next year."
    )
}

/// Summarizer that never touches the network.
#[derive(Debug, Default)]
pub struct EchoSummarizer {
    pub calls: AtomicUsize,
}

impl EchoSummarizer {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, text: &str, filename: &str) -> Result<Summary, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Summary {
            content: format!("{filename}: {} characters summarized", text.chars().count()),
            usage: Usage {
                model: "echo".to_string(),
                prompt_tokens: 120,
                completion_tokens: 30,
                total_tokens: 150,
            },
        })
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

/// Transport that keeps every message it is given.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<ComposedMessage>>,
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: &ComposedMessage) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "recording"
    }
}

/// Transport behaving like a relay that rejects the login.
#[derive(Debug, Default)]
pub struct RejectingTransport;

#[async_trait]
impl MailTransport for RejectingTransport {
    async fn send(&self, _message: &ComposedMessage) -> Result<(), DeliveryError> {
        Err(DeliveryError::Authentication {
            code: 535,
            message: "authentication credentials invalid".to_string(),
        })
    }

    fn transport_name(&self) -> &'static str {
        "rejecting"
    }
}
