//! Model client for OpenAI-compatible chat completion APIs.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;

use super::client::{ModelClient, ModelError, ModelResponse};
use super::envelope::split_response;
use super::message::{ConversationMessage, Role};

/// Default number of retry attempts for failed requests.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between retry attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Configuration for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Pricing vendor key, e.g. "OpenAI" or "DeepSeek". Empty detects it
    /// from `base_url`.
    pub vendor: String,
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Maximum number of retry attempts for failed requests.
    pub max_retries: u32,
    /// Delay between retry attempts in seconds.
    pub retry_delay_secs: u64,
    pub extra_headers: HashMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vendor: String::new(),
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: "EMPTY".to_string(),
            model_name: "autoglm-phone-9b".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            extra_headers: HashMap::new(),
        }
    }
}

impl ModelConfig {
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Set the maximum number of retry attempts for failed requests.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between retry attempts in seconds.
    pub fn with_retry_delay(mut self, delay_secs: u64) -> Self {
        self.retry_delay_secs = delay_secs;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Client for OpenAI, DeepSeek, OpenRouter, vLLM and other compatible servers.
pub struct OpenAiClient {
    config: ModelConfig,
    client: Client,
    provider: String,
}

impl OpenAiClient {
    pub fn new(config: ModelConfig) -> Self {
        let provider = match config.vendor.trim() {
            "" => detect_provider(&config.base_url).to_string(),
            vendor => vendor.to_string(),
        };
        Self {
            config,
            client: Client::new(),
            provider,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn send_request(&self, url: &str, body: &Value) -> Result<ModelResponse, ModelError> {
        let mut request = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");
        for (name, value) in &self.config.extra_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let raw_content = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::ParseError("No choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();
        let usage = completion.usage.unwrap_or_default();
        let (thinking, action) = split_response(&raw_content);

        Ok(ModelResponse {
            thinking,
            action,
            raw_content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn request(
        &self,
        messages: &[ConversationMessage],
        image: Option<&[u8]>,
    ) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model_name,
            "messages": build_messages(messages, image),
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let max_attempts = self.config.max_retries + 1;
        let mut last_error: Option<ModelError> = None;

        for attempt in 1..=max_attempts {
            match self.send_request(&url, &body).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt < max_attempts {
                        tracing::warn!(
                            "Request failed (attempt {}/{}): {}. Retrying in {}s",
                            attempt,
                            max_attempts,
                            e,
                            self.config.retry_delay_secs
                        );
                        sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(ModelError::MaxRetriesExceeded(
            max_attempts,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// Display name of the provider behind `base_url`.
fn detect_provider(base_url: &str) -> &'static str {
    let url = base_url.to_lowercase();
    if url.contains("deepseek") {
        "DeepSeek"
    } else if url.contains("openrouter") {
        "OpenRouter"
    } else if url.contains("volces") {
        "Volcengine"
    } else if url.contains("bigmodel") {
        "Zhipu"
    } else if url.contains("localhost") || url.contains("127.0.0.1") {
        "Local"
    } else {
        "OpenAI"
    }
}

/// Convert the conversation to OpenAI wire format, attaching `image` to the
/// last user message only.
fn build_messages(messages: &[ConversationMessage], image: Option<&[u8]>) -> Vec<Value> {
    let image_index = image.and_then(|_| messages.iter().rposition(|m| m.role == Role::User));
    let image_url = image.map(|data| format!("data:image/png;base64,{}", STANDARD.encode(data)));

    messages
        .iter()
        .enumerate()
        .map(|(i, msg)| match (&image_url, Some(i) == image_index) {
            (Some(url), true) => json!({
                "role": msg.role.as_str(),
                "content": [
                    {"type": "image_url", "image_url": {"url": url, "detail": "high"}},
                    {"type": "text", "text": msg.content},
                ],
            }),
            _ => json!({
                "role": msg.role.as_str(),
                "content": msg.content,
            }),
        })
        .collect()
}
