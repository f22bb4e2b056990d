//! Grid optimizer
//!
//! Aligns every event once, then runs each (combination, event) unit on a
//! bounded pool of blocking workers. The coordinator loop is the only
//! writer of the outcome table and the progress record; both are updated
//! once per finished unit.

use super::{
    select, AlignmentFailure, CombinationResult, EventSplit, GridResult, OptimizerError,
    ParameterGrid, SelectionError, SelectionOutcome, Split,
};
use crate::align::{AlignedEvent, SnapshotAligner};
use crate::backtest::{BacktestSimulator, EventSummary, SimulationError, SplitAccumulator, SplitMetrics};
use crate::config::{AlignerConfig, Config, CostConfig, OptimizerConfig, StrategyConfig};
use crate::data::Dataset;
use crate::model::{ModelCapabilities, ModelManifest};
use crate::progress::ProgressTracker;
use crate::risk::ClosedTrade;
use crate::signal::ParameterCombination;
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use futures_util::{future, stream, StreamExt};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::watch;

type UnitOutcome = Result<EventSummary, SimulationError>;

/// Events aligned once, shared read-only by every unit
#[derive(Debug, Clone, Default)]
pub struct AlignedDataset {
    pub events: Vec<Arc<AlignedEvent>>,
    pub alignment_failures: Vec<AlignmentFailure>,
    pub model: Option<ModelManifest>,
    pub capabilities: Option<ModelCapabilities>,
}

impl AlignedDataset {
    pub fn event_ids(&self) -> Vec<String> {
        self.events.iter().map(|e| e.event_id.clone()).collect()
    }

    /// Events that produced no snapshot at all
    pub fn empty_events(&self) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| e.is_empty())
            .map(|e| e.event_id.clone())
            .collect()
    }

    pub fn get(&self, event_id: &str) -> Option<&Arc<AlignedEvent>> {
        self.events.iter().find(|e| e.event_id == event_id)
    }
}

/// One combination evaluated over every event, without a split
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub metrics: SplitMetrics,
    pub events: Vec<EventSummary>,
    pub omitted: Vec<(String, SimulationError)>,
}

impl Evaluation {
    /// All closed trades in event order
    pub fn trades(&self) -> Vec<ClosedTrade> {
        self.events
            .iter()
            .flat_map(|e| e.trades.iter().cloned())
            .collect()
    }
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    event_ids: Vec<&'a str>,
    combinations: Vec<String>,
    seed: u64,
    train_pct: u32,
    validation_pct: u32,
    top_n: usize,
    aligner: &'a AlignerConfig,
    strategy: &'a StrategyConfig,
    costs: &'a CostConfig,
    model: Option<&'a ModelManifest>,
}

/// Sweeps a parameter grid over a dataset
pub struct GridOptimizer {
    config: OptimizerConfig,
    aligner: SnapshotAligner,
    simulator: Arc<BacktestSimulator>,
    strategy: StrategyConfig,
    costs: CostConfig,
    tracker: ProgressTracker,
}

impl GridOptimizer {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.optimizer.clone(),
            aligner: SnapshotAligner::new(config.aligner.clone()),
            simulator: Arc::new(BacktestSimulator::from_config(&config.strategy, &config.costs)),
            strategy: config.strategy.clone(),
            costs: config.costs.clone(),
            tracker: ProgressTracker::new(),
        }
    }

    /// Report progress through an existing tracker
    pub fn with_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Align every event of the dataset. Events the aligner rejects are
    /// kept as empty events so they count as omitted everywhere.
    pub fn align_dataset(&self, dataset: &Dataset) -> AlignedDataset {
        let capabilities = dataset.model.as_ref().map(ModelCapabilities::resolve);
        if let Some(caps) = &capabilities {
            if caps.consumes_market_price() {
                tracing::warn!(
                    model = %caps.label(),
                    "Model consumes the market price; divergence against that price is leaked"
                );
            }
        }

        let mut alignment_failures = Vec::new();
        let events = dataset
            .events
            .iter()
            .map(|event| match self.aligner.align_event(event) {
                Ok(aligned) => Arc::new(aligned),
                Err(e) => {
                    tracing::warn!(event_id = %event.event_id, error = %e, "Alignment failed");
                    alignment_failures.push(AlignmentFailure {
                        event_id: event.event_id.clone(),
                        reason: e.to_string(),
                    });
                    Arc::new(AlignedEvent {
                        event_id: event.event_id.clone(),
                        start: event.start,
                        end: event.end,
                        snapshots: Vec::new(),
                        report: Default::default(),
                    })
                }
            })
            .collect();

        AlignedDataset {
            events,
            alignment_failures,
            model: dataset.model.clone(),
            capabilities,
        }
    }

    /// Align and optimize
    pub async fn run(
        &self,
        dataset: &Dataset,
        grid: &ParameterGrid,
        shutdown: watch::Receiver<bool>,
    ) -> Result<GridResult, OptimizerError> {
        let aligned = self.align_dataset(dataset);
        self.run_aligned(&aligned, grid, shutdown).await
    }

    /// Optimize over already aligned events
    pub async fn run_aligned(
        &self,
        aligned: &AlignedDataset,
        grid: &ParameterGrid,
        shutdown: watch::Receiver<bool>,
    ) -> Result<GridResult, OptimizerError> {
        if aligned.events.is_empty() {
            return Err(OptimizerError::NoEvents);
        }
        if grid.is_empty() {
            return Err(OptimizerError::EmptyGrid);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = aligned.events.iter().find(|e| !seen.insert(e.event_id.as_str())) {
            return Err(OptimizerError::DuplicateEvent(dup.event_id.clone()));
        }

        let combinations = grid.combinations();
        let labels: Vec<String> = combinations.iter().map(|c| c.label()).collect();
        let event_count = aligned.events.len();
        let total = combinations.len() * event_count;
        let workers = self.config.worker_count();

        let event_split = EventSplit::compute(
            &aligned.event_ids(),
            self.config.seed,
            self.config.train_pct,
            self.config.validation_pct,
        );
        let empty_events = aligned.empty_events();

        tracing::info!(
            combinations = combinations.len(),
            events = event_count,
            units = total,
            workers,
            train = event_split.train.len(),
            validation = event_split.validation.len(),
            test = event_split.test.len(),
            empty_events = empty_events.len(),
            "Starting grid optimization"
        );
        telemetry::set_gauge(GaugeMetric::GridUnitsTotal, total as f64);
        telemetry::set_gauge(GaugeMetric::GridCombinations, combinations.len() as f64);
        self.tracker.start(total);

        let mut outcomes: Vec<Vec<Option<UnitOutcome>>> = vec![vec![None; event_count]; combinations.len()];
        let units = (0..combinations.len()).flat_map(move |c| (0..event_count).map(move |e| (c, e)));

        let mut dispatched = 0;
        let mut finished = stream::iter(units)
            .take_while(move |_| future::ready(!*shutdown.borrow()))
            .map(|(c, e)| {
                dispatched += 1;
                let simulator = Arc::clone(&self.simulator);
                let event = Arc::clone(&aligned.events[e]);
                let combination = combinations[c];
                async move {
                    let outcome = tokio::task::spawn_blocking(move || {
                        // The table keeps aggregates only; trades are replayed on demand
                        simulator.run(&event.snapshots, combination).map(|mut summary| {
                            summary.trades.clear();
                            summary
                        })
                    })
                    .await;
                    (c, e, outcome)
                }
            })
            .buffer_unordered(workers);

        let mut completed = 0;
        let mut units_omitted = 0;
        while let Some((c, e, joined)) = finished.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_error) if join_error.is_panic() => {
                    let event_id = aligned.events[e].event_id.clone();
                    tracing::error!(
                        event_id = %event_id,
                        combination = %labels[c],
                        error = %join_error,
                        "Simulation panicked"
                    );
                    Err(SimulationError::Panicked {
                        event_id,
                        message: join_error.to_string(),
                    })
                }
                Err(join_error) => {
                    self.tracker.fail();
                    return Err(join_error.into());
                }
            };

            if let Err(err) = &outcome {
                units_omitted += 1;
                telemetry::increment(CounterMetric::UnitsOmitted, 1);
                tracing::debug!(
                    event_id = %aligned.events[e].event_id,
                    combination = %labels[c],
                    error = %err,
                    "Unit omitted"
                );
            }
            telemetry::increment(CounterMetric::UnitsCompleted, 1);

            outcomes[c][e] = Some(outcome);
            completed += 1;
            self.tracker.advance(completed, &labels[c]);
        }
        drop(finished);

        if completed < total {
            self.tracker.fail();
            tracing::warn!(completed, dispatched, total, "Grid optimization interrupted");
            return Err(OptimizerError::Interrupted {
                completed,
                dispatched,
                total,
            });
        }

        let index: HashMap<&str, usize> = aligned
            .events
            .iter()
            .enumerate()
            .map(|(i, e)| (e.event_id.as_str(), i))
            .collect();

        let results: Vec<CombinationResult> = combinations
            .iter()
            .zip(&labels)
            .zip(&outcomes)
            .map(|((&combination, label), row)| {
                let metrics = |split: Split| aggregate(event_split.ids(split), row, &index);
                CombinationResult {
                    combination,
                    label: label.clone(),
                    train: metrics(Split::Train),
                    validation: metrics(Split::Validation),
                    test: metrics(Split::Test),
                }
            })
            .collect();

        let selection = match select(&results, self.config.top_n) {
            Ok(selection) => {
                telemetry::set_gauge(
                    GaugeMetric::SelectedTestNetProfit,
                    selection.test.net_profit.to_f64().unwrap_or_default(),
                );
                tracing::info!(
                    selected = %selection.label,
                    test_net = %selection.test.net_profit,
                    test_trades = selection.test.trade_count,
                    "Grid optimization complete"
                );
                self.tracker.complete();
                SelectionOutcome::Selected(selection)
            }
            Err(SelectionError::NoTrainTrades {
                combinations_evaluated,
            }) => {
                tracing::warn!(
                    combinations_evaluated,
                    "No combination produced a train trade; nothing selected"
                );
                self.tracker.fail();
                SelectionOutcome::NoTrainTrades {
                    combinations_evaluated,
                }
            }
        };

        Ok(GridResult {
            fingerprint: self.fingerprint(aligned, grid),
            seed: self.config.seed,
            top_n: self.config.top_n,
            model: aligned.capabilities.as_ref().map(|c| c.label()),
            split: event_split,
            units_total: total,
            units_omitted,
            empty_events,
            alignment_failures: aligned.alignment_failures.clone(),
            combinations: results,
            selection,
        })
    }

    /// Run one combination over every event in dataset order, keeping trades
    pub fn evaluate(&self, aligned: &AlignedDataset, combination: ParameterCombination) -> Evaluation {
        let mut evaluation = Evaluation::default();
        let mut accumulator = SplitAccumulator::new();

        for event in &aligned.events {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.simulator.run(&event.snapshots, combination)
            }))
            .unwrap_or_else(|payload| {
                Err(SimulationError::Panicked {
                    event_id: event.event_id.clone(),
                    message: panic_message(payload.as_ref()),
                })
            });
            match outcome {
                Ok(summary) => {
                    accumulator.record(&summary);
                    evaluation.events.push(summary);
                }
                Err(e) => {
                    accumulator.record_omitted();
                    evaluation.omitted.push((event.event_id.clone(), e));
                }
            }
        }

        evaluation.metrics = accumulator.finish();
        evaluation
    }

    /// Content hash of everything that determines a result
    pub fn fingerprint(&self, aligned: &AlignedDataset, grid: &ParameterGrid) -> String {
        let mut event_ids: Vec<&str> = aligned.events.iter().map(|e| e.event_id.as_str()).collect();
        event_ids.sort_unstable();

        let input = FingerprintInput {
            event_ids,
            combinations: grid.iter().map(|c| c.label()).collect(),
            seed: self.config.seed,
            train_pct: self.config.train_pct,
            validation_pct: self.config.validation_pct,
            top_n: self.config.top_n,
            aligner: self.aligner.config(),
            strategy: &self.strategy,
            costs: &self.costs,
            model: aligned.model.as_ref(),
        };
        let json = serde_json::to_string(&input).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|m| m.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Accumulate one combination's outcomes over a split, in split order
fn aggregate(
    event_ids: &[String],
    row: &[Option<UnitOutcome>],
    index: &HashMap<&str, usize>,
) -> SplitMetrics {
    let mut accumulator = SplitAccumulator::new();
    for id in event_ids {
        match index.get(id.as_str()).and_then(|&e| row[e].as_ref()) {
            Some(Ok(summary)) => accumulator.record(summary),
            _ => accumulator.record_omitted(),
        }
    }
    accumulator.finish()
}
