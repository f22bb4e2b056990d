//! End-to-end trading scenarios: raw series through alignment and simulation

use crate::support::*;
use divergence_backtest::align::SnapshotAligner;
use divergence_backtest::backtest::{BacktestSimulator, SimulationError};
use divergence_backtest::config::Config;
use divergence_backtest::data::{
    Dataset, EventOutcome, JsonEventSource, TradeLedgerReader, TradeLedgerWriter,
};
use divergence_backtest::execution::{CostModel, ExecutionQuality};
use divergence_backtest::optimizer::GridOptimizer;
use divergence_backtest::signal::{ParameterCombination, Side};
use rust_decimal_macros::dec;

fn simulator() -> BacktestSimulator {
    BacktestSimulator::new(dec!(100), 30, CostModel::default())
}

fn params() -> ParameterCombination {
    ParameterCombination::new(dec!(0.05), dec!(0.02)).unwrap()
}

#[test]
fn test_reference_scenario_long_entry_and_exit() {
    let raw = event_from_rows(
        "evt",
        &[
            (0, dec!(0.60), dec!(0.50)),
            (30, dec!(0.62), dec!(0.52)),
            (90, dec!(0.55), dec!(0.54)),
        ],
    );
    let aligned = SnapshotAligner::default().align_event(&raw).unwrap();
    assert_eq!(aligned.snapshots.len(), 3);

    let summary = simulator().run(&aligned.snapshots, params()).unwrap();
    assert_eq!(summary.trade_count, 1);
    let trade = &summary.trades[0];
    assert_eq!(trade.side, Side::LongHome);
    assert_eq!(trade.entry_timestamp, t(30));
    assert_eq!(trade.exit_timestamp, t(90));
    assert_eq!(trade.entry_price, dec!(0.53));
    assert_eq!(trade.exit_price, dec!(0.53));
    assert!(!trade.forced_close);
    assert_eq!(trade.exit_quality, ExecutionQuality::Quoted);
}

#[test]
fn test_open_position_forced_closed_at_final_snapshot() {
    let raw = event_from_rows(
        "evt",
        &[
            (0, dec!(0.60), dec!(0.50)),
            (30, dec!(0.62), dec!(0.52)),
            (90, dec!(0.65), dec!(0.54)),
        ],
    );
    let aligned = SnapshotAligner::default().align_event(&raw).unwrap();

    let summary = simulator().run(&aligned.snapshots, params()).unwrap();
    assert_eq!(summary.trade_count, 1);
    assert_eq!(summary.forced_closes, 1);
    let trade = &summary.trades[0];
    assert!(trade.forced_close);
    assert_eq!(trade.exit_timestamp, t(90));
    assert_eq!(trade.slippage, dec!(0.02) * trade.contracts);
    assert_eq!(trade.net_profit, trade.gross_profit - trade.fees - trade.slippage);
}

#[test]
fn test_no_candles_within_tolerance_counts_as_omitted() {
    let raw = event(
        "evt",
        vec![point("evt", 0, dec!(0.6)), point("evt", 30, dec!(0.6))],
        vec![home_candle("evt", 900, dec!(0.5))],
    );
    let aligned = SnapshotAligner::default().align_event(&raw).unwrap();
    assert!(aligned.snapshots.is_empty());
    assert_eq!(
        simulator().run(&aligned.snapshots, params()),
        Err(SimulationError::Empty)
    );

    let dataset = Dataset {
        model: None,
        events: vec![raw],
    };
    let optimizer = GridOptimizer::new(&Config::default());
    let evaluation = optimizer.evaluate(&optimizer.align_dataset(&dataset), params());
    assert_eq!(evaluation.metrics.trade_count, 0);
    assert_eq!(evaluation.metrics.events_omitted, 1);
    assert_eq!(evaluation.omitted.len(), 1);
}

#[test]
fn test_away_quotes_trade_like_home_quotes() {
    let rows = [
        (0, dec!(0.40), dec!(0.50)),
        (30, dec!(0.37), dec!(0.50)),
        (60, dec!(0.44), dec!(0.45)),
        (120, dec!(0.45), dec!(0.45)),
    ];
    let home = event_from_rows("evt", &rows);
    let away = event(
        "evt",
        home.probabilities.clone(),
        rows.iter().map(|&(s, _, p)| away_candle("evt", s, p)).collect(),
    );

    let aligner = SnapshotAligner::default();
    let from_home = aligner.align_event(&home).unwrap();
    let from_away = aligner.align_event(&away).unwrap();
    assert_eq!(from_home.snapshots, from_away.snapshots);

    let summary = simulator().run(&from_away.snapshots, params()).unwrap();
    assert_eq!(summary.trade_count, 1);
    assert_eq!(summary.trades[0].side, Side::ShortHome);
    assert!(summary.net_profit > dec!(0));
}

#[test]
fn test_profit_independent_of_stored_outcome() {
    let mut home_win = converging_event("evt", dec!(0.10));
    home_win.outcome = Some(EventOutcome::Home);
    let mut away_win = home_win.clone();
    away_win.outcome = Some(EventOutcome::Away);

    let aligner = SnapshotAligner::default();
    let a = simulator()
        .run(&aligner.align_event(&home_win).unwrap().snapshots, params())
        .unwrap();
    let b = simulator()
        .run(&aligner.align_event(&away_win).unwrap().snapshots, params())
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(a.net_profit, a.gross_profit - a.fees - a.slippage);
}

#[test]
fn test_at_most_one_position_per_event() {
    let rows: Vec<_> = (0..40)
        .map(|i| {
            let model = if i % 4 < 2 { dec!(0.62) } else { dec!(0.50) };
            (i * 20, model, dec!(0.50))
        })
        .collect();
    let aligned = SnapshotAligner::default()
        .align_event(&event_from_rows("evt", &rows))
        .unwrap();
    let summary = simulator().run(&aligned.snapshots, params()).unwrap();

    assert!(summary.trade_count > 1);
    for pair in summary.trades.windows(2) {
        assert!(pair[1].entry_timestamp > pair[0].exit_timestamp);
    }
}

#[tokio::test]
async fn test_json_dataset_round_trip_through_ledger() {
    use divergence_backtest::data::EventSource;

    let dataset = Dataset {
        model: None,
        events: vec![
            converging_event("evt-a", dec!(0.10)),
            converging_event("evt-b", dec!(-0.08)),
        ],
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");
    std::fs::write(&path, serde_json::to_string(&dataset).unwrap()).unwrap();

    let loaded = JsonEventSource::new(&path).load().await.unwrap();
    assert_eq!(loaded.event_ids(), vec!["evt-a", "evt-b"]);

    let optimizer = GridOptimizer::new(&Config::default());
    let trades = optimizer
        .evaluate(&optimizer.align_dataset(&loaded), params())
        .trades();
    assert_eq!(trades.len(), 2);

    let written = TradeLedgerWriter::new(dir.path())
        .write(&params().label(), &trades)
        .unwrap()
        .unwrap();
    let read_back = TradeLedgerReader::new(&written).read().unwrap();
    assert_eq!(read_back, trades);
}
