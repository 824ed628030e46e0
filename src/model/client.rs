//! Model client contract shared by all vendor adapters.

use async_trait::async_trait;
use thiserror::Error;

use super::message::ConversationMessage;

/// Model client errors.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },
    #[error("Max retries exceeded after {0} attempts: {1}")]
    MaxRetriesExceeded(u32, String),
}

impl ModelError {
    /// Network failures, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::RequestFailed(_) => true,
            ModelError::ApiError { status, body } => {
                let body = body.to_lowercase();
                *status == 429
                    || (500..600).contains(status)
                    || body.contains("timeout")
                    || body.contains("rate limit")
            }
            ModelError::ParseError(_) => false,
            ModelError::MaxRetriesExceeded(_, _) => false,
        }
    }
}

/// Response from the AI model.
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub thinking: String,
    /// Action directive JSON, or the raw text when the reply was unstructured.
    pub action: String,
    pub raw_content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A vision-language model the agent can consult.
///
/// `messages` is the full conversation; when `image` is given it belongs to
/// the last user message.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn request(
        &self,
        messages: &[ConversationMessage],
        image: Option<&[u8]>,
    ) -> Result<ModelResponse, ModelError>;

    /// Provider display name, e.g. "OpenAI" or "DeepSeek".
    fn provider_name(&self) -> &str;

    /// Model identifier used for pricing lookup.
    fn model_name(&self) -> &str;
}

/// Turn an opaque transport error into an actionable message.
pub fn describe_error(error: &ModelError) -> String {
    let text = error.to_string().to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if has(&["image_url", "image input", "vision", "multimodal", "does not support image"]) {
        "The model does not support image input. Choose a vision-capable model.".to_string()
    } else if has(&["429", "rate limit", "too many requests"]) {
        "Rate limited by the model provider. Wait a moment and try again.".to_string()
    } else if has(&["401", "403", "unauthorized", "invalid api key", "incorrect api key", "authentication"]) {
        "Authentication failed. Check the API key.".to_string()
    } else if has(&["quota", "insufficient", "balance", "billing"]) {
        "Account quota exhausted. Check the provider balance.".to_string()
    } else if has(&["model_not_found", "model not found", "does not exist", "404"]) {
        "Model not found. Check the model name and base URL.".to_string()
    } else if has(&["connect", "dns", "timed out", "timeout", "network"]) {
        "Cannot reach the model service. Check the network and base URL.".to_string()
    } else {
        format!("Model request failed: {}", error)
    }
}
