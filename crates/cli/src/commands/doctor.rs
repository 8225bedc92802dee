//! `voxagent doctor`: Diagnose system health.

use std::time::Duration;

use voxagent_config::AppConfig;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 voxagent doctor - System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ⚠️  No config file - using defaults (run `voxagent config init`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. Fix the config and re-run.");
            return Ok(());
        }
    };

    // Check provider
    match voxagent_providers::build_from_config(&config) {
        Ok(provider) => {
            println!("  ✅ Provider '{}' configured (model {})", provider.name(), config.model.name);

            match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, provider.health_check()).await {
                Ok(Ok(true)) => println!("  ✅ Provider reachable"),
                Ok(Ok(false)) => {
                    println!("  ⚠️  Provider answered but reported unhealthy");
                    issues += 1;
                }
                Ok(Err(e)) => {
                    println!("  ❌ Provider unreachable: {e}");
                    issues += 1;
                }
                Err(_) => {
                    println!(
                        "  ❌ Provider did not answer within {}s",
                        HEALTH_CHECK_TIMEOUT.as_secs()
                    );
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Provider not usable: {e}");
            issues += 1;
        }
    }

    // Check tools
    let registry = voxagent_tools::default_registry(&config);
    if registry.names().is_empty() {
        println!("  ⚠️  No tools enabled");
        issues += 1;
    } else {
        println!("  ✅ Tools: {}", registry.names().join(", "));
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
