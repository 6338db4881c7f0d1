//! `emberchat status` — Show configuration and backend reachability.

use std::sync::Arc;
use std::time::Duration;

use emberchat_backend::OllamaBackend;
use emberchat_config::AppConfig;
use emberchat_core::event::{ConnectivityState, EventBus};
use emberchat_engine::ConnectivityMonitor;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("Emberchat Status");
    println!("================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Database:     {}", config.database_path().display());
    println!("  Images:       {}", config.images_dir().display());
    println!("  Backend:      {}", config.backend_url);
    println!("  Model:        {}", config.default_model);
    println!("  Gen timeout:  {}s", config.generation_timeout_secs);
    println!("  Probe every:  {}s", config.probe_interval_secs);
    println!(
        "  Attach limit: {} MiB",
        config.max_attachment_bytes / (1024 * 1024)
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file — using defaults");
    }

    // One-shot reachability probe.
    let backend = Arc::new(OllamaBackend::new(
        &config.backend_url,
        Duration::from_secs(5),
    ));
    let monitor = ConnectivityMonitor::new(backend, Arc::new(EventBus::default()));
    match monitor.probe_now().await {
        ConnectivityState::Reachable => println!("  Backend reachable"),
        _ => println!("  Backend UNREACHABLE — run `ollama serve`"),
    }

    Ok(())
}
