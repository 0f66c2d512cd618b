//! HTTP gateway for Marionette.
//!
//! Exposes the autopilot as a streaming NDJSON endpoint, session
//! management, the voice catalog and text-to-speech proxy, and a health
//! check.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;
pub mod speech;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use marionette_autopilot::Autopilot;
use marionette_config::AppConfig;
use marionette_memory::InMemoryHistory;
use marionette_providers::Timeouts;

use crate::speech::SpeechClient;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub autopilot: Arc<Autopilot>,
    pub speech: SpeechClient,
}

pub type SharedState = Arc<GatewayState>;

/// JSON error body used by every handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl GatewayState {
    /// Build providers, history and the speech proxy from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let router = marionette_providers::router::build_from_config(config)?;
        let history = Arc::new(InMemoryHistory::with_exchanges(config.autopilot.max_history));
        let autopilot = Autopilot::new(Arc::new(router), history).configured(config);

        let speech_client = marionette_providers::transport::build_client(Timeouts::from(&config.autopilot))?;
        let speech = SpeechClient::new(&config.speech, speech_client);

        Ok(Self {
            autopilot: Arc::new(autopilot),
            speech,
        })
    }
}

/// Build the full router.
///
/// Layers applied:
/// - CORS (configured origins, or any origin when none are listed)
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(state: SharedState, config: &AppConfig) -> Router {
    let api = Router::new()
        .route("/autopilot", post(api::autopilot_handler))
        .route(
            "/autopilot/sessions/{id}",
            get(api::get_session_handler).delete(api::delete_session_handler),
        )
        .route("/voices", get(speech::voices_handler))
        .route("/tts", post(speech::tts_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.gateway.max_body_bytes))
        .layer(cors_layer(&config.gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(GatewayState::from_config(&config)?);
    if !state.speech.is_configured() {
        info!("No speech engine configured; /api/tts will answer 503");
    }

    let app = build_router(state, &config);

    info!(
        addr = %addr,
        provider = %config.default_provider,
        model = %config.default_model,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use marionette_core::error::ProviderError;
    use marionette_core::history::HistoryStore;
    use marionette_core::provider::{Provider, ProviderRequest, TokenStream};
    use marionette_providers::ProviderRouter;
    use tower::ServiceExt;

    /// Replies with the same fragments to every request.
    struct MockProvider {
        reply: Vec<&'static str>,
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn stream(&self, _request: ProviderRequest) -> Result<TokenStream, ProviderError> {
            let (tx, rx) = tokio::sync::mpsc::channel(8);
            let reply = self.reply.clone();
            tokio::spawn(async move {
                for fragment in reply {
                    if tx.send(Ok(fragment.to_string())).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }
    }

    fn test_app(reply: Vec<&'static str>) -> Router {
        let config = AppConfig::default();
        let mut router = ProviderRouter::new("mock");
        router.register("mock", Arc::new(MockProvider { reply }), "mock-model");
        let history = Arc::new(InMemoryHistory::with_exchanges(config.autopilot.max_history));
        let state = Arc::new(GatewayState {
            autopilot: Arc::new(Autopilot::new(Arc::new(router), history).configured(&config)),
            speech: SpeechClient::new(&config.speech, reqwest::Client::new()),
        });
        build_router(state, &config)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_lines(response: axum::response::Response) -> Vec<serde_json::Value> {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = test_app(vec![]);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn autopilot_streams_ndjson_commands() {
        let app = test_app(vec!["{\"arms\":\"wave\",\"say\":\"Hi\"}\n{\"full\":\"spin\"}\n"]);

        let response = app
            .oneshot(post_json("/api/autopilot", serde_json::json!({"prompt": "say hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            api::NDJSON_CONTENT_TYPE
        );

        let lines = body_lines(response).await;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["arms"], "wave");
        assert_eq!(lines[0]["body"], "idle");
        assert_eq!(lines[1]["full"], "twirl");
        assert_eq!(lines[2], serde_json::json!({"done": true}));
    }

    #[tokio::test]
    async fn autopilot_rejects_empty_prompt() {
        let app = test_app(vec![]);
        let response = app
            .oneshot(post_json("/api/autopilot", serde_json::json!({"prompt": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_provider_streams_error_line() {
        let app = test_app(vec![]);
        let response = app
            .oneshot(post_json(
                "/api/autopilot",
                serde_json::json!({"prompt": "wave", "provider": "missing"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let lines = body_lines(response).await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0]["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let app = test_app(vec!["{\"face\":\"happy\"}\n"]);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/autopilot",
                serde_json::json!({"prompt": "smile", "session_id": "stage"}),
            ))
            .await
            .unwrap();
        body_lines(response).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/autopilot/sessions/stage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let session: api::SessionResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(session.session_id, "stage");
        assert_eq!(session.turns.len(), 2);
        assert_eq!(session.turns[0].content, "smile");

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri("/api/autopilot/sessions/stage")
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = app.oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reading_unknown_session_does_not_create_it() {
        let config = AppConfig::default();
        let history = Arc::new(InMemoryHistory::with_exchanges(config.autopilot.max_history));
        let state = Arc::new(GatewayState {
            autopilot: Arc::new(Autopilot::new(
                Arc::new(ProviderRouter::new("mock")),
                history.clone(),
            )),
            speech: SpeechClient::new(&config.speech, reqwest::Client::new()),
        });
        let app = build_router(state, &config);

        for id in ["ghost-1", "ghost-2"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/api/autopilot/sessions/{id}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(history.session_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn voices_catalog() {
        let app = test_app(vec![]);
        let response = app
            .oneshot(Request::builder().uri("/api/voices").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let voices: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(voices.len(), 5);
        assert_eq!(voices[0]["name"], "en-US-JennyNeural");
    }

    #[tokio::test]
    async fn tts_without_engine_is_unavailable() {
        let app = test_app(vec![]);
        let response = app
            .oneshot(post_json("/api/tts", serde_json::json!({"text": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = test_app(vec![]);
        let prompt = "x".repeat(AppConfig::default().gateway.max_body_bytes + 1);
        let response = app
            .oneshot(post_json("/api/autopilot", serde_json::json!({"prompt": prompt})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn invalid_cors_origins_are_skipped() {
        let _ = cors_layer(&["http://localhost:5173".into(), "not a\nheader".into()]);
    }
}
