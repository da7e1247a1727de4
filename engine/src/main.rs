// tripsquad
// Main entry point for the tripsquad binary

use clap::Parser;
use tripsquad_engine::cli::{Cli, Command, ConfigAction};
use tripsquad_engine::config::Config;
use tripsquad_engine::handlers::{
    handle_config_show, handle_memory, handle_plan, handle_status, OutputFormat,
};
use tripsquad_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // An explicit --log level wins over the config file.
    match &cli.log {
        Some(level) => init_telemetry_with_level(level),
        None => init_telemetry(),
    }

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");
    tracing::debug!("tripsquad v{} ({} - {})", version, commit, timestamp);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    if cli.log.is_none() {
        // Only takes effect if RUST_LOG is not set and nothing was installed yet
        init_telemetry_with_level(&config.core.log_level);
    }

    match cli.command {
        Command::Plan(args) => {
            tracing::info!(destination = %args.destination, "Planning trip");
            handle_plan(args, &config, format).await
        }
        Command::Memory { action } => {
            tracing::debug!("Memory action: {:?}", action);
            handle_memory(action, &config, format).await
        }
        Command::Status => handle_status(&config, format).await,
        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
        },
    }
}
