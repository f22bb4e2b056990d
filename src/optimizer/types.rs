//! Optimizer result and error types

use super::EventSplit;
use crate::backtest::SplitMetrics;
use crate::signal::{ParameterCombination, SignalError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Event partition a metric belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Validation, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-split metrics of one parameter combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationResult {
    pub combination: ParameterCombination,
    pub label: String,
    pub train: SplitMetrics,
    pub validation: SplitMetrics,
    pub test: SplitMetrics,
}

impl CombinationResult {
    pub fn metrics(&self, split: Split) -> &SplitMetrics {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.validation,
            Split::Test => &self.test,
        }
    }

    /// Events omitted across all splits
    pub fn events_omitted(&self) -> usize {
        self.train.events_omitted + self.validation.events_omitted + self.test.events_omitted
    }
}

/// A combination that made the train-profit shortlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistEntry {
    pub combination: ParameterCombination,
    pub label: String,
    pub train_net_profit: Decimal,
    pub validation_net_profit: Decimal,
}

/// The combination chosen by the two-stage rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub combination: ParameterCombination,
    pub label: String,
    /// Zero-based rank by train net profit
    pub train_rank: usize,
    pub train: SplitMetrics,
    pub validation: SplitMetrics,
    /// Reported only; never consulted when selecting
    pub test: SplitMetrics,
    pub shortlist: Vec<ShortlistEntry>,
}

/// Outcome of selection, carried in the result either way
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SelectionOutcome {
    Selected(Selection),
    NoTrainTrades { combinations_evaluated: usize },
}

/// Selection failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no combination produced a train-split trade ({combinations_evaluated} evaluated)")]
    NoTrainTrades { combinations_evaluated: usize },
}

/// An event the aligner could not process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentFailure {
    pub event_id: String,
    pub reason: String,
}

/// Full output of one optimizer run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridResult {
    /// blake3 over events, grid, seed and strategy settings
    pub fingerprint: String,
    pub seed: u64,
    pub top_n: usize,
    /// `name@version` of the probability model, when known
    pub model: Option<String>,
    pub split: EventSplit,
    pub units_total: usize,
    pub units_omitted: usize,
    /// Events with no aligned snapshot, omitted from every combination
    pub empty_events: Vec<String>,
    pub alignment_failures: Vec<AlignmentFailure>,
    pub combinations: Vec<CombinationResult>,
    pub selection: SelectionOutcome,
}

impl GridResult {
    pub fn selected(&self) -> Result<&Selection, SelectionError> {
        match &self.selection {
            SelectionOutcome::Selected(selection) => Ok(selection),
            SelectionOutcome::NoTrainTrades {
                combinations_evaluated,
            } => Err(SelectionError::NoTrainTrades {
                combinations_evaluated: *combinations_evaluated,
            }),
        }
    }

    pub fn find(&self, combination: ParameterCombination) -> Option<&CombinationResult> {
        self.combinations
            .iter()
            .find(|r| r.combination == combination)
    }
}

/// Grid construction failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("{field} candidate {value} outside [{min}, {max}]")]
    OutOfSurface {
        field: &'static str,
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },
    #[error("{field} range step must be positive, got {step}")]
    InvalidStep { field: &'static str, step: Decimal },
    #[error("no {0} candidates")]
    NoCandidates(&'static str),
    #[error("no candidate pair satisfies exit < entry")]
    NoValidCombinations,
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Optimizer run failures
#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("dataset has no events")]
    NoEvents,
    #[error("parameter grid is empty")]
    EmptyGrid,
    #[error("duplicate event id {0}")]
    DuplicateEvent(String),
    #[error("run interrupted after {completed} of {total} units ({dispatched} dispatched)")]
    Interrupted {
        completed: usize,
        dispatched: usize,
        total: usize,
    },
    #[error("simulation worker cancelled: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
