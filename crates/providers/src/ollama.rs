//! Native Ollama provider (newline-delimited JSON).
//!
//! `POST /api/chat` with `stream: true` answers with one JSON object per
//! line. Text lives in `message.content`; the final object has `done: true`.

use async_trait::async_trait;
use marionette_core::error::ProviderError;
use marionette_core::message::Message;
use marionette_core::provider::{ProviderRequest, TokenStream};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::transport::{self, LineOutcome};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// A provider for a local Ollama daemon on its default port.
    pub fn local(client: reqwest::Client) -> Self {
        Self::new("ollama", DEFAULT_BASE_URL, client)
    }

    fn chat_body(request: &ProviderRequest) -> ChatRequest<'_> {
        ChatRequest {
            model: &request.model,
            messages: request.messages.iter().map(ChatMessage::from).collect(),
            stream: true,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl marionette_core::Provider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> Result<TokenStream, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .json(&Self::chat_body(&request))
            .send()
            .await
            .map_err(transport::classify)?;

        let response = transport::ensure_success(&self.name, response).await?;
        let provider_name = self.name.clone();

        Ok(transport::spawn_line_pump(
            self.name.clone(),
            response,
            move |line| {
                let outcome = decode_ndjson_line(line);
                if matches!(outcome, LineOutcome::Skip) && !line.trim().is_empty() {
                    trace!(provider = %provider_name, line, "Ignoring NDJSON line");
                }
                outcome
            },
        ))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport::classify)?;
        Ok(response.status().is_success())
    }
}

/// Decode one NDJSON chat chunk.
pub(crate) fn decode_ndjson_line(line: &str) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() {
        return LineOutcome::Skip;
    }

    let Ok(chunk) = serde_json::from_str::<ChatChunk>(line) else {
        return LineOutcome::Skip;
    };

    if let Some(error) = chunk.error {
        return LineOutcome::Fail(ProviderError::StreamInterrupted(error));
    }

    let text = chunk.message.and_then(|m| m.content);
    match (text, chunk.done) {
        (text, true) => LineOutcome::End(text),
        (Some(text), false) => LineOutcome::Fragment(text),
        (None, false) => LineOutcome::Skip,
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for ChatMessage<'a> {
    fn from(m: &'a Message) -> Self {
        Self {
            role: m.role.as_str(),
            content: &m.content,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crate::transport::{Timeouts, build_client};
    use axum::Json;
    use axum::Router;
    use axum::routing::{get, post};
    use marionette_core::Provider;
    use std::sync::{Arc, Mutex};

    fn provider(base_url: &str) -> OllamaProvider {
        OllamaProvider::new("ollama", base_url, build_client(Timeouts::default()).unwrap())
    }

    async fn collect(mut rx: TokenStream) -> (Vec<String>, Option<ProviderError>) {
        let mut fragments = Vec::new();
        while let Some(item) = rx.recv().await {
            match item {
                Ok(fragment) => fragments.push(fragment),
                Err(e) => return (fragments, Some(e)),
            }
        }
        (fragments, None)
    }

    #[test]
    fn decode_fragment_and_done() {
        assert_eq!(
            decode_ndjson_line(r#"{"message":{"role":"assistant","content":"{\"face\""},"done":false}"#),
            LineOutcome::Fragment("{\"face\"".into())
        );
        assert_eq!(
            decode_ndjson_line(r#"{"message":{"role":"assistant","content":""},"done":true,"total_duration":1}"#),
            LineOutcome::End(Some(String::new()))
        );
        assert_eq!(decode_ndjson_line(r#"{"done":true}"#), LineOutcome::End(None));
    }

    #[test]
    fn decode_skips_noise() {
        assert_eq!(decode_ndjson_line("   "), LineOutcome::Skip);
        assert_eq!(decode_ndjson_line("not json"), LineOutcome::Skip);
        assert_eq!(decode_ndjson_line(r#"{"done":false}"#), LineOutcome::Skip);
    }

    #[test]
    fn decode_error_object() {
        assert_eq!(
            decode_ndjson_line(r#"{"error":"model 'x' not found"}"#),
            LineOutcome::Fail(ProviderError::StreamInterrupted("model 'x' not found".into()))
        );
    }

    #[test]
    fn chat_body_carries_options() {
        let mut request = ProviderRequest::new("llama3.2", vec![Message::system("s"), Message::user("u")]);
        request.max_tokens = Some(64);
        let json = serde_json::to_value(OllamaProvider::chat_body(&request)).unwrap();
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "u");
        assert_eq!(json["options"]["num_predict"], 64);
    }

    #[tokio::test]
    async fn streams_chunks_until_done() {
        let seen = Arc::new(Mutex::new(None::<serde_json::Value>));
        let capture = seen.clone();
        let app = Router::new().route(
            "/api/chat",
            post(move |Json(body): Json<serde_json::Value>| {
                let capture = capture.clone();
                async move {
                    *capture.lock().unwrap() = Some(body);
                    concat!(
                        "{\"message\":{\"content\":\"{\\\"body\\\":\"},\"done\":false}\n",
                        "{\"message\":{\"content\":\"\\\"sit\\\"}\\n\"},\"done\":false}\n",
                        "{\"message\":{\"content\":\"\"},\"done\":true}\n",
                        "{\"message\":{\"content\":\"ignored\"},\"done\":false}\n",
                    )
                }
            }),
        );
        let base = test_support::serve(app).await;

        let rx = provider(&base)
            .stream(ProviderRequest::new("llama3.2", vec![Message::user("sit")]))
            .await
            .unwrap();
        let (fragments, err) = collect(rx).await;
        assert!(err.is_none());
        assert_eq!(fragments.concat(), "{\"body\":\"sit\"}\n");

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["messages"][0]["content"], "sit");
    }

    #[tokio::test]
    async fn in_band_error_aborts_stream() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async {
                concat!(
                    "{\"message\":{\"content\":\"{\"},\"done\":false}\n",
                    "{\"error\":\"out of memory\"}\n",
                )
            }),
        );
        let base = test_support::serve(app).await;

        let rx = provider(&base)
            .stream(ProviderRequest::new("m", vec![Message::user("x")]))
            .await
            .unwrap();
        let (fragments, err) = collect(rx).await;
        assert_eq!(fragments, vec!["{"]);
        assert_eq!(
            err,
            Some(ProviderError::StreamInterrupted("out of memory".into()))
        );
    }

    #[tokio::test]
    async fn unterminated_last_line_is_flushed() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async { "{\"message\":{\"content\":\"tail\"},\"done\":false}" }),
        );
        let base = test_support::serve(app).await;

        let rx = provider(&base)
            .stream(ProviderRequest::new("m", vec![Message::user("x")]))
            .await
            .unwrap();
        let (fragments, err) = collect(rx).await;
        assert_eq!(fragments, vec!["tail"]);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn health_check_hits_tags() {
        let app = Router::new().route("/api/tags", get(|| async { "{\"models\":[]}" }));
        let base = test_support::serve(app).await;
        assert!(provider(&base).health_check().await.unwrap());

        let err = provider(&test_support::refused_url())
            .health_check()
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Connection(_)));
    }
}
