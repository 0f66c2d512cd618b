//! Provider router: selects the correct token source based on config.
//!
//! Handles provider creation and resolves a request's provider name (or the
//! configured default) to a provider plus the model to ask it for.

use std::collections::HashMap;
use std::sync::Arc;

use marionette_config::{AppConfig, WireProtocol};
use marionette_core::error::ProviderError;
use marionette_core::provider::Provider;
use tracing::debug;

use crate::ollama::{self, OllamaProvider};
use crate::openai_compat::OpenAiCompatProvider;
use crate::transport::{self, Timeouts};

/// A provider together with the model it should be asked for.
#[derive(Clone)]
pub struct Route {
    pub provider: Arc<dyn Provider>,
    pub model: String,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Routes autopilot requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Route>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider name.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider and the model it serves by default.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) {
        self.providers.insert(
            name.into(),
            Route {
                provider,
                model: model.into(),
            },
        );
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).map(|r| r.provider.clone())
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// Resolve a requested provider name, or the default when none is given.
    pub fn resolve(&self, requested: Option<&str>) -> Result<Route, ProviderError> {
        let name = requested
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.default_provider);

        self.providers.get(name).cloned().ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "unknown provider '{name}' (available: {})",
                self.list().join(", ")
            ))
        })
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
///
/// Every provider shares one HTTP client carrying the autopilot timeouts.
pub fn build_from_config(config: &AppConfig) -> Result<ProviderRouter, ProviderError> {
    let client = transport::build_client(Timeouts::from(&config.autopilot))?;
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let protocol = provider_config.protocol_for(name);
        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name, protocol));
        let model = provider_config
            .default_model
            .clone()
            .unwrap_or_else(|| config.default_model.clone());
        let api_key = config.api_key_for(name).unwrap_or_default();

        let provider = make_provider(name, protocol, &base_url, &api_key, client.clone());
        debug!(provider = %name, ?protocol, %base_url, %model, "Registered provider");
        router.register(name.clone(), provider, model);
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let name = &config.default_provider;
        let protocol = marionette_config::default_protocol(name);
        let base_url = default_base_url(name, protocol);
        let api_key = config.api_key.clone().unwrap_or_default();

        let provider = make_provider(name, protocol, &base_url, &api_key, client);
        router.register(name.clone(), provider, config.default_model.clone());
    }

    Ok(router)
}

fn make_provider(
    name: &str,
    protocol: WireProtocol,
    base_url: &str,
    api_key: &str,
    client: reqwest::Client,
) -> Arc<dyn Provider> {
    match protocol {
        WireProtocol::Ndjson => Arc::new(OllamaProvider::new(name, base_url, client)),
        WireProtocol::Sse => Arc::new(OpenAiCompatProvider::new(name, base_url, api_key, client)),
    }
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str, protocol: WireProtocol) -> String {
    match (provider_name, protocol) {
        ("ollama", WireProtocol::Ndjson) => ollama::DEFAULT_BASE_URL.into(),
        ("ollama", WireProtocol::Sse) => format!("{}/v1", ollama::DEFAULT_BASE_URL),
        ("openrouter", _) => "https://openrouter.ai/api/v1".into(),
        ("openai", _) => "https://api.openai.com/v1".into(),
        ("deepseek", _) => "https://api.deepseek.com/v1".into(),
        ("groq", _) => "https://api.groq.com/openai/v1".into(),
        ("together", _) => "https://api.together.xyz/v1".into(),
        ("vllm", _) => "http://localhost:8000/v1".into(),
        ("llamacpp" | "llama.cpp", _) => "http://localhost:8080/v1".into(),
        (_, WireProtocol::Ndjson) => ollama::DEFAULT_BASE_URL.into(),
        (_, WireProtocol::Sse) => "http://localhost:8080/v1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marionette_config::ProviderConfig;

    fn openai_config() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("sk-test".into()),
            api_url: None,
            default_model: Some("gpt-4o-mini".into()),
            protocol: None,
        }
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter", WireProtocol::Sse).contains("openrouter.ai"));
        assert!(default_base_url("openai", WireProtocol::Sse).contains("api.openai.com"));
        assert_eq!(
            default_base_url("ollama", WireProtocol::Ndjson),
            "http://localhost:11434"
        );
        assert_eq!(
            default_base_url("ollama", WireProtocol::Sse),
            "http://localhost:11434/v1"
        );
    }

    #[test]
    fn build_from_default_config() {
        let router = build_from_config(&AppConfig::default()).unwrap();
        let route = router.resolve(None).unwrap();
        assert_eq!(route.provider.name(), "ollama");
        assert_eq!(route.model, "llama3.2");
    }

    #[test]
    fn configured_providers_resolve_by_name() {
        let mut config = AppConfig::default();
        config.providers.insert("openai".into(), openai_config());
        let router = build_from_config(&config).unwrap();

        assert_eq!(router.list(), vec!["ollama", "openai"]);
        let route = router.resolve(Some("openai")).unwrap();
        assert_eq!(route.provider.name(), "openai");
        assert_eq!(route.model, "gpt-4o-mini");
    }

    #[test]
    fn blank_request_falls_back_to_default() {
        let router = build_from_config(&AppConfig::default()).unwrap();
        assert_eq!(router.resolve(Some("  ")).unwrap().provider.name(), "ollama");
    }

    #[test]
    fn unknown_provider_is_not_configured() {
        let router = build_from_config(&AppConfig::default()).unwrap();
        let err = router.resolve(Some("nope")).unwrap_err();
        match err {
            ProviderError::NotConfigured(msg) => {
                assert!(msg.contains("nope"));
                assert!(msg.contains("ollama"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_router_has_no_default() {
        let router = ProviderRouter::new("ollama");
        assert!(router.resolve(None).is_err());
        assert!(router.list().is_empty());
    }
}
