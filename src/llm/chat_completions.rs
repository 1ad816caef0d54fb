//! Chat Completions summarizer.
//!
//! Sends a single non-streaming request per document and reads the first
//! choice together with the usage block.

use serde::Deserialize;

use super::{
    LlmSettings, Message, Summarizer, SummarizeError, Summary, Usage, ensure_summarizable,
    summary_messages,
};

/// Summarizer backed by the Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsSummarizer {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsSummarizer")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatCompletionsSummarizer {
    /// Create a new summarizer with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    async fn complete(&self, messages: Vec<Message>) -> Result<Summary, SummarizeError> {
        let url = self.settings.provider.build_chat_url(&self.settings.endpoint);

        let body = serde_json::json!({
            "model": self.settings.deployment_name,
            "messages": messages,
        });

        let rb = self.http.post(&url).json(&body);
        let response = self
            .settings
            .provider
            .authorize(rb, &self.settings.api_key)
            .send()
            .await
            .map_err(|e| SummarizeError::Http(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SummarizeError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), text));
        }

        parse_completion(&text, &self.settings.deployment_name)
    }
}

#[async_trait::async_trait]
impl Summarizer for ChatCompletionsSummarizer {
    async fn summarize(&self, text: &str, filename: &str) -> Result<Summary, SummarizeError> {
        ensure_summarizable(text)?;

        tracing::info!(
            file = %filename,
            model = %self.settings.deployment_name,
            input_chars = text.chars().count(),
            "Requesting summary"
        );

        let messages = summary_messages(&self.settings.system_prompt, filename, text);
        let summary = self.complete(messages).await?;

        tracing::info!(
            file = %filename,
            summary_chars = summary.content.chars().count(),
            total_tokens = summary.usage.total_tokens,
            prompt_tokens = summary.usage.prompt_tokens,
            completion_tokens = summary.usage.completion_tokens,
            "Summary received"
        );

        Ok(summary)
    }

    fn model_name(&self) -> &str {
        &self.settings.deployment_name
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

/// Map a non-success HTTP status to a [`SummarizeError`].
fn classify_status(status: u16, body: String) -> SummarizeError {
    match status {
        401 | 403 => SummarizeError::Authentication { status, body },
        429 => SummarizeError::RateLimited(body),
        _ => SummarizeError::Backend { status, body },
    }
}

/// Decode a Chat Completions response body.
fn parse_completion(body: &str, fallback_model: &str) -> Result<Summary, SummarizeError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| SummarizeError::MalformedResponse(e.to_string()))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| SummarizeError::MalformedResponse("no message content".to_string()))?;

    let model = response
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback_model.to_string());

    let usage = match response.usage {
        Some(u) => Usage {
            model,
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        },
        None => Usage {
            model,
            ..Usage::default()
        },
    };

    Ok(Summary { content, usage })
}
