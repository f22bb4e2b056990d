//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Probability points that produced a snapshot
    SnapshotsAligned,
    /// Sum-to-one and price-jump anomalies
    AlignmentAnomalies,
    /// Closed trades across all simulations
    TradesClosed,
    /// Entry signals skipped for lack of a quote
    EntriesSkipped,
    /// Finished (combination, event) units
    UnitsCompleted,
    /// Units excluded from their combination's aggregate
    UnitsOmitted,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Total units in the current grid run
    GridUnitsTotal,
    /// Combinations in the current grid
    GridCombinations,
    /// Net profit of the selected combination on the test split
    SelectedTestNetProfit,
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::SnapshotsAligned => "divbt_snapshots_aligned_total",
        CounterMetric::AlignmentAnomalies => "divbt_alignment_anomalies_total",
        CounterMetric::TradesClosed => "divbt_trades_closed_total",
        CounterMetric::EntriesSkipped => "divbt_entries_skipped_total",
        CounterMetric::UnitsCompleted => "divbt_units_completed_total",
        CounterMetric::UnitsOmitted => "divbt_units_omitted_total",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::GridUnitsTotal => "divbt_grid_units",
        GaugeMetric::GridCombinations => "divbt_grid_combinations",
        GaugeMetric::SelectedTestNetProfit => "divbt_selected_test_net_profit",
    }
}

/// Increment a counter
pub fn increment(metric: CounterMetric, value: u64) {
    metrics::counter!(counter_name(metric)).increment(value);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(gauge_name(metric)).set(value);
}

/// Start the Prometheus scrape endpoint. Must run inside a tokio runtime.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
