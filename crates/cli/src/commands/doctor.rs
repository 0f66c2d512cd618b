//! `marionette doctor`: Diagnose configuration and provider health.

use marionette_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Marionette Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file, using defaults (run `marionette init`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue found. Fix the config and re-run.");
            return Ok(());
        }
    };

    println!();
    println!("   Provider:  {}", config.default_provider);
    println!("   Model:     {}", config.default_model);
    println!("   Gateway:   {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   History:   {} exchanges per session",
        config.autopilot.max_history
    );
    println!(
        "   Timeouts:  connect {}s, read {}s",
        config.autopilot.connect_timeout_secs, config.autopilot.read_timeout_secs
    );
    match &config.speech.engine_url {
        Some(url) => println!("   Speech:    {url} (voice {})", config.speech.default_voice),
        None => println!("   Speech:    not configured"),
    }
    println!();

    let router = match marionette_providers::router::build_from_config(&config) {
        Ok(router) => router,
        Err(e) => {
            println!("  ❌ Providers could not be built: {e}");
            return Ok(());
        }
    };

    for name in router.list() {
        let Some(provider) = router.get(name) else {
            continue;
        };
        match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{name}' reachable"),
            Ok(false) => {
                println!("  ⚠️  Provider '{name}' responded but reported unhealthy");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{name}' unreachable: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
