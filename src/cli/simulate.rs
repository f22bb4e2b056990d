//! Simulate command implementation

use super::{load_dataset, OutputFormat};
use crate::config::Config;
use crate::data::TradeLedgerWriter;
use crate::optimizer::{GridOptimizer, ParameterGrid};
use anyhow::Context;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::json;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Dataset JSON file (defaults to data.dataset_path)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Entry threshold
    #[arg(long)]
    pub entry: Decimal,

    /// Exit threshold
    #[arg(long)]
    pub exit: Decimal,

    /// Write the trade ledger into this directory
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl SimulateArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let grid = ParameterGrid::new(&[self.entry], &[self.exit])?;
        let combination = grid
            .combinations()
            .first()
            .copied()
            .context("Exit threshold must be below the entry threshold")?;

        let data_path = self.data.clone().unwrap_or_else(|| config.data.dataset_path.clone());
        let dataset = load_dataset(&data_path).await?;

        let optimizer = GridOptimizer::new(&config);
        let aligned = optimizer.align_dataset(&dataset);
        let evaluation = optimizer.evaluate(&aligned, combination);

        for (event_id, error) in &evaluation.omitted {
            tracing::warn!(event_id = %event_id, error = %error, "Event omitted");
        }

        if let Some(dir) = &self.ledger {
            let trades = evaluation.trades();
            if let Some(path) = TradeLedgerWriter::new(dir).write(&combination.label(), &trades)? {
                tracing::info!(path = ?path, trades = trades.len(), "Wrote trade ledger");
            }
        }

        match self.format {
            OutputFormat::Json => {
                let omitted: Vec<_> = evaluation
                    .omitted
                    .iter()
                    .map(|(event_id, error)| json!({ "event_id": event_id, "error": error.to_string() }))
                    .collect();
                let report = json!({
                    "combination": combination,
                    "metrics": evaluation.metrics,
                    "events": evaluation.events,
                    "omitted": omitted,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Table => {
                print!("{}", evaluation.metrics.format_table(&combination.label()));
            }
        }
        Ok(())
    }
}
