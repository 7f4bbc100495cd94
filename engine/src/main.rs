// Docent document assistant
// Main entry point for the docent binary

use clap::Parser;
use docent_engine::cli::{Cli, Command};
use docent_engine::config::Config;
use docent_engine::handlers::{handle_ask, handle_chat, handle_doctor, OutputFormat};
use docent_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // RUST_LOG still wins over both of these
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Docent v{} ({} - {})", version, commit, timestamp);

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Chat => {
            tracing::info!(
                "Starting chat with model '{}' on collection '{}'",
                config.llm.ollama.model,
                config.store.collection
            );
            handle_chat(&config).await
        }

        Command::Ask { question } => {
            tracing::info!("Answering question: {}", question);
            handle_ask(question, &config, format).await
        }

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
