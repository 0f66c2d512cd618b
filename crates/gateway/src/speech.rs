//! Voice catalog and text-to-speech proxy.
//!
//! Synthesis itself happens in an external engine; this module picks the
//! voice and prosody, forwards the request, and streams the audio back.
//!
//! Engine request body: `{"text", "voice", "rate", "pitch", "volume"}`,
//! answered with `audio/mpeg` bytes.

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use marionette_config::SpeechConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{ErrorResponse, SharedState};

/// Rate / pitch / volume adjustments in the engine's relative notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Prosody {
    pub rate: &'static str,
    pub pitch: &'static str,
    pub volume: &'static str,
}

impl Prosody {
    pub const NEUTRAL: Prosody = Prosody {
        rate: "+0%",
        pitch: "+0Hz",
        volume: "+0%",
    };

    /// Prosody for an emotion tag; unknown or absent tags are neutral.
    pub fn for_emotion(emotion: Option<&str>) -> Self {
        let Some(emotion) = emotion.map(|e| e.trim().to_lowercase()) else {
            return Self::NEUTRAL;
        };
        EMOTION_PROSODY
            .iter()
            .find(|(name, _)| *name == emotion)
            .map_or(Self::NEUTRAL, |(_, prosody)| *prosody)
    }
}

const EMOTION_PROSODY: &[(&str, Prosody)] = &[
    ("laugh", Prosody { rate: "+10%", pitch: "+5Hz", volume: "+0%" }),
    ("angry", Prosody { rate: "+5%", pitch: "-3Hz", volume: "+10%" }),
    ("sad", Prosody { rate: "-20%", pitch: "-5Hz", volume: "-10%" }),
    ("thinking", Prosody { rate: "-10%", pitch: "+0Hz", volume: "-5%" }),
    ("frowning", Prosody { rate: "-5%", pitch: "-3Hz", volume: "+0%" }),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub name: &'static str,
    pub label: &'static str,
    pub gender: &'static str,
}

pub const RECOMMENDED_VOICES: &[Voice] = &[
    Voice { name: "en-US-JennyNeural", label: "Jenny (Female)", gender: "Female" },
    Voice { name: "en-US-AriaNeural", label: "Aria (Female)", gender: "Female" },
    Voice { name: "en-US-GuyNeural", label: "Guy (Male)", gender: "Male" },
    Voice { name: "en-GB-SoniaNeural", label: "Sonia (British Female)", gender: "Female" },
    Voice { name: "en-AU-NatashaNeural", label: "Natasha (Australian Female)", gender: "Female" },
];

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("no speech engine configured (set [speech].engine_url)")]
    NotConfigured,

    #[error("text must not be empty")]
    EmptyText,

    #[error("speech engine unreachable: {0}")]
    Unreachable(String),

    #[error("speech engine returned status {0}")]
    Status(u16),
}

impl SpeechError {
    fn status_code(&self) -> StatusCode {
        match self {
            SpeechError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            SpeechError::EmptyText => StatusCode::BAD_REQUEST,
            SpeechError::Unreachable(_) | SpeechError::Status(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for SpeechError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
}

#[derive(Debug, Serialize)]
struct EngineRequest<'a> {
    text: &'a str,
    voice: &'a str,
    #[serde(flatten)]
    prosody: Prosody,
}

/// Forwards synthesis requests to the configured engine.
pub struct SpeechClient {
    engine_url: Option<String>,
    default_voice: String,
    client: reqwest::Client,
}

impl SpeechClient {
    pub fn new(config: &SpeechConfig, client: reqwest::Client) -> Self {
        Self {
            engine_url: config.engine_url.clone().filter(|u| !u.trim().is_empty()),
            default_voice: config.default_voice.clone(),
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.engine_url.is_some()
    }

    /// Send `request` to the engine and return its successful response.
    pub async fn synthesize(&self, request: &TtsRequest) -> Result<reqwest::Response, SpeechError> {
        let url = self.engine_url.as_deref().ok_or(SpeechError::NotConfigured)?;
        let text = request.text.trim();
        if text.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let voice = request
            .voice
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.default_voice);
        let prosody = Prosody::for_emotion(request.emotion.as_deref());
        debug!(voice, chars = text.chars().count(), ?prosody, "Synthesizing speech");

        let response = self
            .client
            .post(url)
            .json(&EngineRequest { text, voice, prosody })
            .send()
            .await
            .map_err(|e| SpeechError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Speech engine returned error");
            return Err(SpeechError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

/// `GET /api/voices`
pub async fn voices_handler() -> Json<&'static [Voice]> {
    Json(RECOMMENDED_VOICES)
}

/// `POST /api/tts`: stream synthesized audio back to the caller.
pub async fn tts_handler(
    State(state): State<SharedState>,
    Json(request): Json<TtsRequest>,
) -> Result<Response, SpeechError> {
    let upstream = state.speech.synthesize(&request).await?;
    Ok((
        [(header::CONTENT_TYPE, "audio/mpeg")],
        Body::from_stream(upstream.bytes_stream()),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_prosody_table() {
        assert_eq!(
            Prosody::for_emotion(Some("sad")),
            Prosody { rate: "-20%", pitch: "-5Hz", volume: "-10%" }
        );
        assert_eq!(Prosody::for_emotion(Some(" Laugh ")).pitch, "+5Hz");
        assert_eq!(Prosody::for_emotion(Some("bored")), Prosody::NEUTRAL);
        assert_eq!(Prosody::for_emotion(None), Prosody::NEUTRAL);
    }

    #[test]
    fn engine_request_flattens_prosody() {
        let body = serde_json::to_value(EngineRequest {
            text: "hi",
            voice: "en-US-GuyNeural",
            prosody: Prosody::for_emotion(Some("angry")),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "text": "hi",
                "voice": "en-US-GuyNeural",
                "rate": "+5%",
                "pitch": "-3Hz",
                "volume": "+10%",
            })
        );
    }

    #[test]
    fn catalog_starts_with_default_voice() {
        assert_eq!(RECOMMENDED_VOICES.len(), 5);
        assert_eq!(RECOMMENDED_VOICES[0].name, SpeechConfig::default().default_voice);
    }

    #[tokio::test]
    async fn unconfigured_client_refuses() {
        let client = SpeechClient::new(&SpeechConfig::default(), reqwest::Client::new());
        assert!(!client.is_configured());
        let request = TtsRequest { text: "hi".into(), voice: None, emotion: None };
        assert!(matches!(
            client.synthesize(&request).await,
            Err(SpeechError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_forwarding() {
        let config = SpeechConfig {
            engine_url: Some("http://127.0.0.1:9/tts".into()),
            ..SpeechConfig::default()
        };
        let client = SpeechClient::new(&config, reqwest::Client::new());
        let request = TtsRequest { text: "   ".into(), voice: None, emotion: None };
        assert!(matches!(
            client.synthesize(&request).await,
            Err(SpeechError::EmptyText)
        ));
    }
}
