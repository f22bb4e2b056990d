//! Grid optimizer end to end

use crate::support::*;
use divergence_backtest::config::Config;
use divergence_backtest::data::{
    Dataset, EventData, JsonEventSource, MarketSide, RawMarketCandle,
};
use divergence_backtest::model::{ModelInput, ModelManifest};
use divergence_backtest::optimizer::{
    EventSplit, GridOptimizer, GridResult, OptimizerError, ParameterGrid, SelectionOutcome, Split,
};
use divergence_backtest::progress::{ProgressStatus, ProgressTracker};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;

/// Twenty events: most reward a low entry threshold, a few are flat
fn dataset() -> Dataset {
    let events = (0..20)
        .map(|i| {
            let edge = match i % 5 {
                0 => dec!(0),
                1 | 2 => dec!(0.08),
                3 => dec!(-0.12),
                _ => dec!(0.15),
            };
            converging_event(&format!("game-{:02}", i), edge)
        })
        .collect();
    Dataset {
        model: Some(ModelManifest {
            name: "win-prob".to_string(),
            version: "3".to_string(),
            required_inputs: vec![ModelInput::ScoreDifferential, ModelInput::TimeRemaining],
        }),
        events,
    }
}

fn grid() -> ParameterGrid {
    ParameterGrid::new(
        &[dec!(0.05), dec!(0.10), dec!(0.20)],
        &[dec!(0.00), dec!(0.01), dec!(0.02)],
    )
    .unwrap()
}

fn config() -> Config {
    let mut config = Config::default();
    config.optimizer.workers = Some(3);
    config.optimizer.top_n = 3;
    config
}

async fn run(config: &Config, data: &Dataset) -> GridResult {
    let (_tx, rx) = watch::channel(false);
    GridOptimizer::new(config).run(data, &grid(), rx).await.unwrap()
}

#[tokio::test]
async fn test_every_unit_accounted_for() {
    let result = run(&config(), &dataset()).await;

    assert_eq!(result.units_total, grid().len() * 20);
    assert_eq!(result.units_omitted, 0);
    assert_eq!(result.split.len(), 20);
    for combination in &result.combinations {
        let evaluated: usize = Split::ALL
            .iter()
            .map(|&s| combination.metrics(s).events_evaluated)
            .sum();
        assert_eq!(evaluated + combination.events_omitted(), 20);
    }
}

#[tokio::test]
async fn test_selection_comes_from_train_shortlist() {
    let result = run(&config(), &dataset()).await;
    let selection = result.selected().unwrap();

    assert!(selection.shortlist.len() <= 3);
    assert!(selection
        .shortlist
        .iter()
        .any(|entry| entry.combination == selection.combination));
    let best_validation = selection
        .shortlist
        .iter()
        .map(|entry| entry.validation_net_profit)
        .max()
        .unwrap();
    assert_eq!(selection.validation.net_profit, best_validation);

    let reported = result.find(selection.combination).unwrap();
    assert_eq!(reported.test, selection.test);
}

#[tokio::test]
async fn test_same_inputs_same_result() {
    let data = dataset();
    let a = run(&config(), &data).await;

    let mut single_worker = config();
    single_worker.optimizer.workers = Some(1);
    let b = run(&single_worker, &data).await;

    assert_eq!(a.combinations, b.combinations);
    assert_eq!(a.selection, b.selection);
    assert_eq!(a.fingerprint, b.fingerprint);
}

#[tokio::test]
async fn test_seed_controls_split() {
    let data = dataset();
    let mut reseeded = config();
    reseeded.optimizer.seed = 7;

    let a = run(&config(), &data).await;
    let b = run(&reseeded, &data).await;

    assert_eq!(
        a.split,
        EventSplit::compute(&data.event_ids(), 42, 70, 15)
    );
    assert_ne!(a.split, b.split);
    assert_ne!(a.fingerprint, b.fingerprint);
}

#[tokio::test]
async fn test_result_serializes_and_reloads() {
    let result = run(&config(), &dataset()).await;
    let json = serde_json::to_string(&result).unwrap();
    let back: GridResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
    assert!(json.contains("\"outcome\":\"selected\""));
}

#[tokio::test]
async fn test_all_flat_events_select_nothing() {
    let data = Dataset {
        model: None,
        events: (0..6)
            .map(|i| converging_event(&format!("flat-{}", i), Decimal::ZERO))
            .collect(),
    };
    let result = run(&config(), &data).await;
    assert_eq!(
        result.selection,
        SelectionOutcome::NoTrainTrades {
            combinations_evaluated: grid().len()
        }
    );
}

#[tokio::test]
async fn test_loaded_json_dataset_optimizes() {
    let json = serde_json::to_string(&dataset()).unwrap();
    let loaded = JsonEventSource::parse(&json).unwrap();

    let result = run(&config(), &loaded).await;
    assert_eq!(result.model.as_deref(), Some("win-prob@3"));
    assert!(result.selected().is_ok());
}

#[tokio::test]
async fn test_interrupt_stops_dispatch() {
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let result = GridOptimizer::new(&config())
        .run(&dataset(), &grid(), rx)
        .await;
    assert!(matches!(result, Err(OptimizerError::Interrupted { .. })));
}

/// Two full round trips from 0.01 to 0.99 whenever the exit band is
/// non-zero. At a stake near `Decimal::MAX / 100` the summed gross profit
/// overflows.
fn overflowing_event(event_id: &str) -> EventData {
    let rows = [
        (0, dec!(0.50), dec!(0.01)),
        (30, dec!(0.60), dec!(0.01)),
        (60, dec!(0.99), dec!(0.99)),
        (90, dec!(0.50), dec!(0.01)),
        (120, dec!(0.60), dec!(0.01)),
        (150, dec!(0.99), dec!(0.99)),
        (180, dec!(0.50), dec!(0.50)),
    ];
    event(
        event_id,
        rows.iter().map(|&(s, m, _)| point(event_id, s, m)).collect(),
        rows.iter()
            .map(|&(s, _, p)| RawMarketCandle {
                event_id: event_id.to_string(),
                market_side: MarketSide::Home,
                timestamp: t(s),
                resolved_price: Some(p),
                bid_price: Some(p),
                ask_price: Some(p),
            })
            .collect(),
    )
}

#[tokio::test]
async fn test_panicking_unit_is_omitted_not_fatal() {
    let mut config = config();
    config.strategy.stake = Decimal::from_str("700000000000000000000000000").unwrap();
    assert!(config.validate().is_ok());

    let mut data = dataset();
    data.events.truncate(9);
    data.events.push(overflowing_event("overflow"));

    let result = run(&config, &data).await;

    // Exit bands 0.01 and 0.02 produce the two round trips; 0.00 never exits early
    assert_eq!(result.units_total, grid().len() * 10);
    assert_eq!(result.units_omitted, 6);
    for combination in &result.combinations {
        let evaluated: usize = Split::ALL
            .iter()
            .map(|&s| combination.metrics(s).events_evaluated)
            .sum();
        assert_eq!(evaluated + combination.events_omitted(), 10);
        assert!(combination.events_omitted() <= 1);
    }
    assert!(result.selected().is_ok());
}

#[tokio::test]
async fn test_malformed_aligned_event_isolated() {
    let optimizer = GridOptimizer::new(&config());
    let mut aligned = optimizer.align_dataset(&dataset());

    let mut broken = (*aligned.events[1]).clone();
    broken.event_id = "broken".to_string();
    for snapshot in &mut broken.snapshots {
        snapshot.event_id = "broken".to_string();
    }
    broken.snapshots[2].timestamp = broken.snapshots[1].timestamp;
    assert!(!broken.snapshots.is_empty());
    aligned.events.push(Arc::new(broken));

    let (_tx, rx) = watch::channel(false);
    let result = optimizer.run_aligned(&aligned, &grid(), rx).await.unwrap();

    assert_eq!(result.units_total, grid().len() * 21);
    assert_eq!(result.units_omitted, grid().len());
    assert!(result.empty_events.is_empty());
    for combination in &result.combinations {
        assert_eq!(combination.events_omitted(), 1);
    }
    assert!(result.selected().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interrupt_mid_run_drains_in_flight_units() {
    let data = Dataset {
        model: None,
        events: (0..60)
            .map(|i| converging_event(&format!("evt-{:02}", i), dec!(0.08)))
            .collect(),
    };
    let tracker = ProgressTracker::new();
    let optimizer = GridOptimizer::new(&config()).with_tracker(tracker.clone());
    let (tx, rx) = watch::channel(false);

    let watcher = tokio::spawn(async move {
        loop {
            if tracker.snapshot().current > 0 {
                let _ = tx.send(true);
                return;
            }
            tokio::task::yield_now().await;
        }
    });

    let result = optimizer.run(&data, &grid(), rx).await;
    watcher.await.unwrap();

    match result {
        Err(OptimizerError::Interrupted {
            completed,
            dispatched,
            total,
        }) => {
            assert_eq!(total, grid().len() * 60);
            assert!(completed > 0 && completed < total, "completed {}", completed);
            assert_eq!(completed, dispatched);
            let progress = optimizer.tracker().snapshot();
            assert_eq!(progress.status, ProgressStatus::Error);
            assert_eq!(progress.current, completed);
        }
        other => panic!("expected interruption, got {:?}", other.map(|r| r.units_total)),
    }
}
