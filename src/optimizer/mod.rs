//! Grid optimizer
//!
//! Sweeps entry/exit thresholds over a seeded train/validation/test
//! partition of events and selects the combination that generalizes.

mod grid;
mod runner;
mod selection;
mod split;
mod types;

pub use grid::{expand_range, ParameterGrid, ENTRY_MAX, ENTRY_MIN, EXIT_MAX, EXIT_MIN};
pub use runner::{AlignedDataset, Evaluation, GridOptimizer};
pub use selection::select;
pub use split::EventSplit;
pub use types::{
    AlignmentFailure, CombinationResult, GridError, GridResult, OptimizerError, Selection,
    SelectionError, SelectionOutcome, ShortlistEntry, Split,
};
