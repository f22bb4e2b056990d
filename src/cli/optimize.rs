//! Optimize command implementation

use super::{load_dataset, OutputFormat};
use crate::config::Config;
use crate::data::TradeLedgerWriter;
use crate::optimizer::{GridOptimizer, GridResult, ParameterGrid};
use crate::progress::{Observer, ProgressMessage, ProgressReporter, ProgressTracker};
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Args, Debug)]
pub struct OptimizeArgs {
    /// Dataset JSON file (defaults to data.dataset_path)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Output directory for results (defaults to data.output_dir)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Split seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Shortlist size for validation
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Worker pool size
    #[arg(long)]
    pub workers: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl OptimizeArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        if let Some(seed) = self.seed {
            config.optimizer.seed = seed;
        }
        if let Some(top_n) = self.top_n {
            config.optimizer.top_n = top_n;
        }
        if self.workers.is_some() {
            config.optimizer.workers = self.workers;
        }
        config.validate()?;

        let data_path = self.data.clone().unwrap_or_else(|| config.data.dataset_path.clone());
        let output_dir = self.output.clone().unwrap_or_else(|| config.data.output_dir.clone());

        let dataset = load_dataset(&data_path).await?;
        let grid = ParameterGrid::from_config(&config.grid)?;

        let tracker = ProgressTracker::new();
        let reporter = ProgressReporter::spawn(
            tracker.clone(),
            Duration::from_millis(config.optimizer.progress_interval_ms),
        );
        let printer = tokio::spawn(print_progress(reporter.subscribe()));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, letting in-flight units finish");
                let _ = shutdown_tx.send(true);
            }
        });

        let optimizer = GridOptimizer::new(&config).with_tracker(tracker);
        let aligned = optimizer.align_dataset(&dataset);
        let outcome = optimizer.run_aligned(&aligned, &grid, shutdown_rx).await;

        interrupt.abort();
        reporter.shutdown().await;
        if let Err(e) = printer.await {
            tracing::warn!(error = %e, "Progress printer failed");
        }

        let result = outcome?;
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;
        let result_path = output_dir.join("grid_result.json");
        std::fs::write(&result_path, serde_json::to_string_pretty(&result)?)
            .with_context(|| format!("Failed to write {}", result_path.display()))?;
        tracing::info!(path = ?result_path, fingerprint = %result.fingerprint, "Wrote grid result");

        if let Ok(selection) = result.selected() {
            let trades = optimizer.evaluate(&aligned, selection.combination).trades();
            if let Some(path) = TradeLedgerWriter::new(&output_dir).write(&selection.label, &trades)? {
                tracing::info!(path = ?path, trades = trades.len(), "Wrote trade ledger");
            }
        }

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
            OutputFormat::Table => print_tables(&result),
        }
        Ok(())
    }
}

/// Print progress lines to stderr until the stream ends
async fn print_progress(mut observer: Observer) {
    while let Some(message) = observer.recv().await {
        if let ProgressMessage::Update(snapshot) = message {
            eprintln!(
                "[{:>5.1}%] {}/{} {} {}",
                snapshot.fraction() * 100.0,
                snapshot.current,
                snapshot.total,
                snapshot.status.as_str(),
                snapshot.current_combination_label
            );
            if snapshot.status.is_terminal() {
                break;
            }
        }
    }
}

fn print_tables(result: &GridResult) {
    println!(
        "Grid: {} combinations, {} units ({} omitted), seed {}",
        result.combinations.len(),
        result.units_total,
        result.units_omitted,
        result.seed
    );
    println!(
        "Split: {} train / {} validation / {} test events",
        result.split.train.len(),
        result.split.validation.len(),
        result.split.test.len()
    );
    if !result.empty_events.is_empty() {
        println!("Events without snapshots: {}", result.empty_events.join(", "));
    }

    match result.selected() {
        Ok(selection) => {
            println!("\nSelected: {} (train rank {})", selection.label, selection.train_rank + 1);
            println!("\n{:<28} {:>12} {:>12}", "Shortlist", "Train net", "Valid net");
            for entry in &selection.shortlist {
                println!(
                    "{:<28} {:>12.2} {:>12.2}",
                    entry.label, entry.train_net_profit, entry.validation_net_profit
                );
            }
            print!("{}", selection.train.format_table("TRAIN"));
            print!("{}", selection.validation.format_table("VALIDATION"));
            print!("{}", selection.test.format_table("TEST (reported only)"));
        }
        Err(e) => println!("\nNo selection: {}", e),
    }
    println!("Fingerprint: {}", result.fingerprint);
}
