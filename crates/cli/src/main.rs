//! Emberchat CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Interactive conversation with attachments
//! - `models`  — List models available on the backend
//! - `status`  — Show configuration and backend reachability

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "emberchat",
    about = "Emberchat — local-first chat client for Ollama",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat interactively; /attach, /detach, /quit inside the loop
    Chat {
        /// Model to chat with (overrides the configured default)
        #[arg(short, long)]
        model: Option<String>,

        /// Resume an existing conversation by id
        #[arg(short, long)]
        conversation: Option<i64>,
    },

    /// List models available on the backend
    Models,

    /// Show configuration and backend reachability
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat {
            model,
            conversation,
        } => commands::chat::run(model, conversation).await?,
        Commands::Models => commands::models::run().await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
