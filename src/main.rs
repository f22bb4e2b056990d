use clap::Parser;
use divergence_backtest::cli::{Cli, Commands};
use divergence_backtest::config::Config;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration; only a missing file falls back to the defaults
    if !Path::new(&cli.config).exists() {
        eprintln!("Warning: {} not found, using built-in default configuration", cli.config);
    }
    let config = Config::load_or_default(&cli.config)?;

    // Initialize telemetry
    let _telemetry = divergence_backtest::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Optimize(args) => {
            tracing::info!("Starting grid optimization");
            args.execute(config).await?;
        }
        Commands::Simulate(args) => {
            tracing::info!(entry = %args.entry, exit = %args.exit, "Starting simulation");
            args.execute(config).await?;
        }
        Commands::Align(args) => {
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
