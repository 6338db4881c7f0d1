//! `emberchat models` — List models available on the backend.

use std::time::Duration;

use emberchat_backend::OllamaBackend;
use emberchat_config::AppConfig;
use emberchat_core::backend::ChatBackend;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let backend = OllamaBackend::new(
        &config.backend_url,
        Duration::from_secs(config.generation_timeout_secs),
    );

    let mut models = backend.list_models().await?;
    if models.is_empty() {
        println!("No models installed. Pull one with `ollama pull {}`.", config.default_model);
        return Ok(());
    }
    models.sort_by(|a, b| a.name.cmp(&b.name));

    println!("Models on {}", config.backend_url);
    println!();
    for model in &models {
        let marker = if model.name == config.default_model {
            "*"
        } else {
            " "
        };
        println!(
            "  {marker} {:<32} {:>10}  {}",
            model.name,
            human_size(model.size),
            model.modified_at.format("%Y-%m-%d")
        );
    }
    println!();
    println!("  * configured default");

    Ok(())
}

fn human_size(bytes: i64) -> String {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let bytes = bytes as f64;
    if bytes >= GIB {
        format!("{:.1} GiB", bytes / GIB)
    } else {
        format!("{:.0} MiB", bytes / MIB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_render_in_binary_units() {
        assert_eq!(human_size(3_300_000_000), "3.1 GiB");
        assert_eq!(human_size(52_428_800), "50 MiB");
    }
}
