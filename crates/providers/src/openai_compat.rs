//! OpenAI-compatible provider implementation (server-sent events).
//!
//! Works with: OpenAI, OpenRouter, Groq, vLLM, LM Studio, llama.cpp server,
//! Ollama's `/v1` endpoint, and any other `/v1/chat/completions` endpoint.
//!
//! The reply arrives as `data: {json}` lines. Each fragment is the
//! `content` of the first choice's delta; `data: [DONE]` ends the stream.

use async_trait::async_trait;
use marionette_core::error::ProviderError;
use marionette_core::message::Message;
use marionette_core::provider::{ProviderRequest, TokenStream};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::transport::{self, LineOutcome};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>, client: reqwest::Client) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, client)
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }
}

#[async_trait]
impl marionette_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> Result<TokenStream, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": true,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .authorized(self.client.post(&url))
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(transport::classify)?;

        let response = transport::ensure_success(&self.name, response).await?;
        let provider_name = self.name.clone();

        Ok(transport::spawn_line_pump(
            self.name.clone(),
            response,
            move |line| {
                let outcome = decode_sse_line(line);
                if matches!(outcome, LineOutcome::Skip) && !line.trim().is_empty() {
                    trace!(provider = %provider_name, line, "Ignoring SSE line");
                }
                outcome
            },
        ))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(transport::classify)?;

        Ok(response.status().is_success())
    }
}

/// Decode one event-stream line.
pub(crate) fn decode_sse_line(line: &str) -> LineOutcome {
    // Blank separators, `:` comments, `event:`/`id:`/`retry:` fields
    let Some(data) = line.strip_prefix("data:") else {
        return LineOutcome::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return LineOutcome::End(None);
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(StreamResponse {
            error: Some(error), ..
        }) => LineOutcome::Fail(ProviderError::StreamInterrupted(error.message)),
        Ok(resp) => resp
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .map_or(LineOutcome::Skip, LineOutcome::Fragment),
        Err(_) => LineOutcome::Skip,
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}
