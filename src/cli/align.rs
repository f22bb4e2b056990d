//! Align command implementation

use super::{load_dataset, OutputFormat};
use crate::config::Config;
use crate::optimizer::GridOptimizer;
use clap::Args;
use serde_json::json;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct AlignArgs {
    /// Dataset JSON file (defaults to data.dataset_path)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl AlignArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let data_path = self.data.clone().unwrap_or_else(|| config.data.dataset_path.clone());
        let dataset = load_dataset(&data_path).await?;
        let aligned = GridOptimizer::new(&config).align_dataset(&dataset);

        match self.format {
            OutputFormat::Json => {
                let events: Vec<_> = aligned
                    .events
                    .iter()
                    .map(|e| json!({
                        "event_id": e.event_id,
                        "snapshots": e.snapshots.len(),
                        "report": e.report,
                    }))
                    .collect();
                let report = json!({
                    "events": events,
                    "alignment_failures": aligned.alignment_failures,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Table => {
                println!(
                    "{:<24} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
                    "Event", "Points", "Snaps", "Unmatch", "Trimmed", "SumToOne", "Jumps"
                );
                for event in &aligned.events {
                    let r = &event.report;
                    println!(
                        "{:<24} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
                        event.event_id,
                        r.probability_points,
                        event.snapshots.len(),
                        r.unmatched_points,
                        r.trimmed_snapshots,
                        r.sum_to_one_count(),
                        r.price_jump_count()
                    );
                }
                for failure in &aligned.alignment_failures {
                    println!("FAILED {}: {}", failure.event_id, failure.reason);
                }
            }
        }
        Ok(())
    }
}
