//! Provider-specific addressing for chat completion backends.
//!
//! Azure `OpenAI` addresses a deployment by path and authenticates with an
//! `api-key` header; `OpenAI` and compatible gateways use a bearer token and
//! carry the model in the request body.

/// Supported completion providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        /// Deployment name (required for Azure)
        deployment_name: String,
        /// API version (e.g., "2024-02-15-preview")
        api_version: String,
    },
    /// Generic OpenAI-compatible provider
    Generic,
}

impl Provider {
    /// Detect provider from the endpoint URL.
    ///
    /// Azure endpoints are returned with the given deployment and API version
    /// filled in; other providers ignore both.
    #[must_use]
    pub fn detect(endpoint: &str, deployment_name: &str, api_version: &str) -> Self {
        let lower = endpoint.to_lowercase();

        if lower.contains("azure.com") || lower.contains("azure-api.net") {
            Self::AzureOpenAI {
                deployment_name: deployment_name.to_string(),
                api_version: api_version.to_string(),
            }
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Build the chat completions URL for this provider.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The base URL (trailing slash is ignored)
    #[must_use]
    pub fn build_chat_url(&self, endpoint: &str) -> String {
        let base = endpoint.trim_end_matches('/');

        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => {
                format!(
                    "{base}/openai/deployments/{deployment_name}/chat/completions?api-version={api_version}"
                )
            }
            _ => format!("{base}/v1/chat/completions"),
        }
    }

    /// Attach credentials the way this provider expects them.
    pub fn authorize(&self, rb: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        match self {
            Self::AzureOpenAI { .. } => rb.header("api-key", api_key),
            Self::OpenAI | Self::Generic => rb.bearer_auth(api_key),
        }
    }
}
