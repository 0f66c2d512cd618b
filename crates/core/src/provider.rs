//! Provider trait: the token source abstraction over LLM backends.
//!
//! A Provider knows how to send a prompt to an LLM and hand back the reply
//! as a lazy stream of text fragments, whatever the upstream wire protocol.
//!
//! Implementations: OpenAI-compatible event streams, Ollama line-delimited JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "llama3.2", "gpt-4o-mini")
    pub model: String,

    /// System prompt, prior turns, and the current instruction
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Text fragments in arrival order.
///
/// The channel closing marks the end of the reply. An `Err` item is the last
/// item the source will ever send. Dropping the receiver cancels the upstream
/// request.
pub type TokenStream = mpsc::Receiver<Result<String, ProviderError>>;

/// The core Provider trait.
///
/// Every LLM backend implements this trait. The autopilot calls `stream()`
/// without knowing which wire protocol sits behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "ollama", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a stream of text fragments.
    async fn stream(&self, request: ProviderRequest) -> Result<TokenStream, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
