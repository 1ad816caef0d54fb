//! Summarization client for chat completion backends.
//!
//! The pipeline depends on the [`Summarizer`] trait only. The concrete
//! [`ChatCompletionsSummarizer`] talks to Azure `OpenAI`, `OpenAI` or any
//! OpenAI-compatible endpoint through the Chat Completions API.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdf_summary_mailer::llm::{ChatCompletionsSummarizer, Summarizer};
//!
//! let settings = config.llm_settings()?;
//! let summarizer = ChatCompletionsSummarizer::new(settings);
//! let summary = summarizer.summarize(&text, "report.pdf").await?;
//! println!("{} ({} tokens)", summary.content, summary.usage.total_tokens);
//! ```

pub mod chat_completions;
pub mod provider;

pub use chat_completions::ChatCompletionsSummarizer;
pub use provider::Provider;

use serde::{Deserialize, Serialize};

/// Minimum number of characters (after trimming) worth sending to the backend.
pub const MIN_SUMMARY_INPUT_CHARS: usize = 100;

/// Connection and model settings for the completion backend.
#[derive(Clone)]
pub struct LlmSettings {
    /// Endpoint URL (e.g., `https://my-resource.openai.azure.com`).
    pub endpoint: String,
    /// API key for authentication.
    pub api_key: String,
    /// Deployment name on Azure, model identifier elsewhere.
    pub deployment_name: String,
    /// Azure API version.
    pub api_version: String,
    /// System instruction sent with every request.
    pub system_prompt: String,
    /// Provider type, detected from the endpoint.
    pub provider: Provider,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("deployment_name", &self.deployment_name)
            .field("api_version", &self.api_version)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// A message in a chat completion exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
}

impl Message {
    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Token usage reported by the backend for one completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Model identifier echoed by the backend.
    pub model: String,
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens produced in the completion.
    pub completion_tokens: u64,
    /// Sum reported by the backend.
    pub total_tokens: u64,
}

/// A generated summary and the usage it cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Completion text, verbatim.
    pub content: String,
    /// Usage metadata.
    pub usage: Usage,
}

/// Errors returned by a [`Summarizer`].
#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    /// Input was rejected locally before any request was made.
    #[error("Text too short to summarize: {chars} characters (minimum {MIN_SUMMARY_INPUT_CHARS})")]
    TextTooShort {
        /// Characters left after trimming.
        chars: usize,
    },

    /// The backend rejected the credentials.
    #[error("Authentication failed ({status}): {body}")]
    Authentication {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The backend is throttling requests.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Any other non-success response.
    #[error("Backend error ({status}): {body}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The request did not complete.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The response could not be interpreted.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Check the local precondition for summarization.
pub fn ensure_summarizable(text: &str) -> Result<(), SummarizeError> {
    let chars = text.trim().chars().count();
    if chars < MIN_SUMMARY_INPUT_CHARS {
        return Err(SummarizeError::TextTooShort { chars });
    }
    Ok(())
}

/// Build the system + user exchange for one document.
#[must_use]
pub fn summary_messages(system_prompt: &str, filename: &str, text: &str) -> Vec<Message> {
    vec![
        Message::system(system_prompt),
        Message::user(format!(
            "Please summarize the following PDF document (file name: {filename}):\n\n{text}"
        )),
    ]
}

/// Trait for summarization backends.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync + std::fmt::Debug {
    /// Summarize `text` extracted from the document named `filename`.
    async fn summarize(&self, text: &str, filename: &str) -> Result<Summary, SummarizeError>;

    /// Model or deployment used, for logging.
    fn model_name(&self) -> &str;
}
