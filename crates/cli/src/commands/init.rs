//! `marionette init`: Write the default configuration file.

use std::path::Path;

use marionette_config::AppConfig;

pub async fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();

    println!("🎭 Marionette — Setup");
    println!("=====================\n");

    if write_default(&config_path, force)? {
        println!("✅ Wrote default config: {}", config_path.display());
        println!();
        println!("  Next steps:");
        println!("    1. Set MARIONETTE_API_KEY (or OPENAI_API_KEY) for hosted providers");
        println!("    2. Or run Ollama locally and set default_provider = \"ollama\"");
        println!("    3. Check everything with `marionette doctor`");
    } else {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Re-run with --force to overwrite it.");
    }

    Ok(())
}

/// Write the default TOML to `path`. Returns `false` when the file exists
/// and `force` is not set.
fn write_default(path: &Path, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default(&path, false).unwrap());
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, AppConfig::default().default_provider);
    }

    #[test]
    fn existing_file_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = \"custom\"\n").unwrap();

        assert!(!write_default(&path, false).unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("custom"));

        assert!(write_default(&path, true).unwrap());
        assert!(!std::fs::read_to_string(&path).unwrap().contains("custom"));
    }
}
