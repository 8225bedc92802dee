//! `voxagent config`: Configuration management commands.

use voxagent_config::AppConfig;

/// Problems that do not make the file invalid but will bite at chat time.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    match config.model.provider.as_str() {
        "openai" | "openrouter" if !config.has_api_key() => {
            warnings.push("Hosted provider without an API key (set VOXAGENT_API_KEY)");
        }
        "custom" if config.model.base_url.is_none() => {
            warnings.push("Provider 'custom' needs model.base_url");
        }
        "ollama" | "openai" | "openrouter" | "custom" => {}
        _ => warnings.push("Unknown provider (expected ollama, openai, openrouter or custom)"),
    }

    if !config.tools.web_search.enabled && !config.tools.wikipedia.enabled {
        warnings.push("All tools disabled; the assistant can only answer from the model");
    }

    warnings
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:    {}", config.model.provider);
            println!("   Model:       {}", config.model.name);
            println!("   Iterations:  {}", config.agent.max_iterations);
            println!("   History:     {} messages", config.agent.history_limit);
            println!("   Busy policy: {:?}", config.agent.busy_policy);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.model.api_key.is_some() {
        config.model.api_key = Some("[REDACTED]".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();
    if config_path.exists() && !force {
        println!("   Config already exists at {}", config_path.display());
        println!("   Use --force to overwrite it.");
        return Ok(());
    }

    std::fs::create_dir_all(AppConfig::config_dir())?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("   ✅ Wrote {}", config_path.display());
    Ok(())
}
