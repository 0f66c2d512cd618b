//! `marionette serve`: Start the HTTP gateway.

use marionette_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    eprintln!("🎭 Marionette Gateway");
    eprintln!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    eprintln!("   Provider:  {} ({})", config.default_provider, config.default_model);

    marionette_gateway::start(config).await?;

    Ok(())
}
