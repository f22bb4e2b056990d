//! Progress protocol observed during a real optimizer run

use crate::support::*;
use divergence_backtest::config::Config;
use divergence_backtest::data::Dataset;
use divergence_backtest::optimizer::{GridOptimizer, ParameterGrid};
use divergence_backtest::progress::{
    ProgressMessage, ProgressReporter, ProgressSnapshot, ProgressStatus, ProgressTracker,
};
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::sync::watch;

fn dataset() -> Dataset {
    Dataset {
        model: None,
        events: (0..12)
            .map(|i| converging_event(&format!("evt-{:02}", i), dec!(0.09)))
            .collect(),
    }
}

fn grid() -> ParameterGrid {
    ParameterGrid::new(&[dec!(0.04), dec!(0.06)], &[dec!(0.01), dec!(0.02)]).unwrap()
}

async fn collect_updates(mut observer: divergence_backtest::progress::Observer) -> Vec<ProgressSnapshot> {
    let mut updates = Vec::new();
    while let Ok(Some(message)) = tokio::time::timeout(Duration::from_secs(5), observer.recv()).await {
        if let ProgressMessage::Update(snapshot) = message {
            let terminal = snapshot.status.is_terminal();
            updates.push(snapshot);
            if terminal {
                break;
            }
        }
    }
    updates
}

#[tokio::test]
async fn test_observer_sees_monotonic_progress_to_completion() {
    let tracker = ProgressTracker::new();
    let reporter = ProgressReporter::spawn(tracker.clone(), Duration::from_millis(5));
    let observer = reporter.subscribe();
    let collector = tokio::spawn(collect_updates(observer));

    let mut config = Config::default();
    config.optimizer.workers = Some(2);
    let optimizer = GridOptimizer::new(&config).with_tracker(tracker);
    let (_tx, rx) = watch::channel(false);
    let result = optimizer.run(&dataset(), &grid(), rx).await.unwrap();

    let updates = collector.await.unwrap();
    reporter.shutdown().await;

    assert!(!updates.is_empty());
    for pair in updates.windows(2) {
        assert_ne!(pair[0], pair[1], "unchanged record pushed twice");
        if pair[0].total == pair[1].total {
            assert!(pair[1].current >= pair[0].current);
        }
    }

    let last = updates.last().unwrap();
    assert_eq!(last.status, ProgressStatus::Complete);
    assert_eq!(last.current, result.units_total);
    assert_eq!(last.total, 48);
    assert!(last.current_combination_label.starts_with("entry="));
}

#[tokio::test]
async fn test_late_observer_gets_current_record_first() {
    let tracker = ProgressTracker::new();
    tracker.start(10);
    tracker.advance(4, "entry=0.05 exit=0.02");
    let reporter = ProgressReporter::spawn(tracker.clone(), Duration::from_millis(5));

    let mut early = reporter.subscribe();
    let first = tokio::time::timeout(Duration::from_secs(2), early.recv())
        .await
        .unwrap();
    let mut late = reporter.subscribe();
    let late_first = tokio::time::timeout(Duration::from_secs(2), late.recv())
        .await
        .unwrap();

    assert_eq!(first, late_first);
    match late_first {
        Some(ProgressMessage::Update(snapshot)) => {
            assert_eq!(snapshot.current, 4);
            assert_eq!(snapshot.total, 10);
        }
        other => panic!("unexpected message {:?}", other),
    }

    tracker.complete();
    reporter.shutdown().await;
}

#[tokio::test]
async fn test_heartbeat_answered_during_run() {
    let tracker = ProgressTracker::new();
    tracker.start(1);
    let reporter = ProgressReporter::spawn(tracker.clone(), Duration::from_millis(5));
    let mut observer = reporter.subscribe();

    assert!(observer.ping());
    let mut saw_pong = false;
    for _ in 0..3 {
        match tokio::time::timeout(Duration::from_secs(2), observer.recv()).await {
            Ok(Some(ProgressMessage::Pong)) => {
                saw_pong = true;
                break;
            }
            Ok(Some(ProgressMessage::Update(_))) => continue,
            other => panic!("unexpected {:?}", other),
        }
    }
    assert!(saw_pong);

    tracker.complete();
    reporter.shutdown().await;
}
