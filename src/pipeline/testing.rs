//! In-memory fakes for the pipeline traits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::Document;
use crate::file_processing::{ExtractedText, ExtractionError, TextExtractor};
use crate::llm::{Summarizer, SummarizeError, Summary, Usage};
use crate::mail::{ComposedMessage, DeliveryError, MailTransport};

/// Text long enough to pass the summarization precondition.
pub fn long_text(topic: &str) -> String {
    format!("{topic}: ").repeat(4) + &"Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(3)
}

pub fn document(name: &str) -> Document {
    Document {
        path: PathBuf::from("/nonexistent").join(name),
        display_name: name.to_string(),
        size_bytes: 2048,
    }
}

#[derive(Debug, Clone)]
pub enum FakePage {
    Text(String),
    Fail,
    Panic,
}

/// Extractor answering from a table keyed by file name; unknown files fail.
#[derive(Debug, Default)]
pub struct FakeExtractor {
    files: HashMap<String, FakePage>,
}

impl FakeExtractor {
    pub fn with(mut self, name: &str, page: FakePage) -> Self {
        self.files.insert(name.to_string(), page);
        self
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(
        &self,
        path: &Path,
        _max_pages: usize,
    ) -> Result<ExtractedText, ExtractionError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.files.get(&name) {
            Some(FakePage::Text(text)) => Ok(ExtractedText {
                text: text.clone(),
                total_pages: 1,
                pages_read: 1,
            }),
            Some(FakePage::Panic) => panic!("extractor blew up on {name}"),
            Some(FakePage::Fail) | None => Err(ExtractionError::Parse(format!("cannot parse {name}"))),
        }
    }

    fn supports_mime_type(&self, _mime_type: &str) -> bool {
        true
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Summarizer that counts calls and echoes the file name.
#[derive(Debug, Default)]
pub struct FakeSummarizer {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeSummarizer {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, text: &str, filename: &str) -> Result<Summary, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SummarizeError::RateLimited("slow down".to_string()));
        }
        Ok(Summary {
            content: format!("Summary of {filename}"),
            usage: Usage {
                model: "fake-model".to_string(),
                prompt_tokens: text.len() as u64,
                completion_tokens: 10,
                total_tokens: text.len() as u64 + 10,
            },
        })
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

/// Transport that records subjects and optionally rejects the credential.
#[derive(Debug, Default)]
pub struct FakeTransport {
    pub sent: Mutex<Vec<ComposedMessage>>,
    pub reject_auth: bool,
}

impl FakeTransport {
    pub fn rejecting() -> Self {
        Self {
            sent: Mutex::default(),
            reject_auth: true,
        }
    }

    pub fn sent_subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.subject.clone())
            .collect()
    }
}

#[async_trait]
impl MailTransport for FakeTransport {
    async fn send(&self, message: &ComposedMessage) -> Result<(), DeliveryError> {
        if self.reject_auth {
            return Err(DeliveryError::Authentication {
                code: 535,
                message: "5.7.8 Username and Password not accepted".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "fake"
    }
}
