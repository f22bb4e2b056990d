//! CLI interface for divergence-backtest
//!
//! Provides subcommands for:
//! - `optimize`: Sweep the parameter grid and select a combination
//! - `simulate`: Run one combination over every event
//! - `align`: Report per-event alignment diagnostics
//! - `config`: Show the effective configuration

mod align;
mod optimize;
mod simulate;

pub use align::AlignArgs;
pub use optimize::OptimizeArgs;
pub use simulate::SimulateArgs;

use crate::data::{Dataset, EventSource, JsonEventSource};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "divergence-backtest")]
#[command(about = "Backtest and optimize a model-vs-market probability divergence strategy")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sweep the entry/exit grid and select a combination
    Optimize(OptimizeArgs),
    /// Run a single combination over every event
    Simulate(SimulateArgs),
    /// Report alignment diagnostics per event
    Align(AlignArgs),
    /// Show the effective configuration
    Config,
}

/// Report format for command output
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Load and validate a JSON dataset
pub async fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    JsonEventSource::new(path)
        .load()
        .await
        .with_context(|| format!("Failed to load dataset from {}", path.display()))
}
