//! Model client module for AI inference.

mod client;
mod envelope;
mod message;
mod openai;

pub use client::{describe_error, ModelClient, ModelError, ModelResponse};
pub use envelope::{split_response, Phase, ResponseEnvelope};
pub use message::{ConversationMessage, Role};
pub use openai::{ModelConfig, OpenAiClient, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS};
