//! `chatline status`: show the effective configuration.

use std::time::Duration;

use chatline_config::{AppConfig, EngineBackend};
use chatline_engine::RemoteEngine;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("Chatline Status");
    println!("===============");
    println!("  Engine:           {}", config.engine.backend);
    println!("  Model:            {}", config.engine.model);
    if config.engine.backend == EngineBackend::Remote {
        println!("  Endpoint:         {}", config.engine.endpoint);
    }
    println!("  Max input chars:  {}", config.generation.max_input_length);
    println!("  Response tokens:  {}", config.generation.max_response_tokens);
    println!("  Temperature:      {}", config.generation.temperature);
    println!("  Repetition pen.:  {}", config.generation.repetition_penalty);
    println!("  Gateway:          {}:{}", config.gateway.host, config.gateway.port);
    println!("  Allowed origins:  {}", config.gateway.allowed_origins.join(", "));

    let config_path = AppConfig::active_path();
    if config_path.exists() {
        println!("\n  Config file: {}", config_path.display());
    } else {
        println!("\n  No config file, using defaults (run `chatline init` to create one)");
    }

    if config.engine.backend == EngineBackend::Remote {
        let engine = RemoteEngine::new(&config.engine.endpoint, Duration::from_secs(5))?;
        match engine.probe().await {
            Ok(()) => println!("  Generation server reachable"),
            Err(e) => println!("  Generation server unreachable: {e}"),
        }
    }

    Ok(())
}
