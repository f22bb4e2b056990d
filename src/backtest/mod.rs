//! Backtesting module
//!
//! Replays aligned snapshots through the trade state machine with
//! quote-based execution, risk-neutral sizing and cost accounting

mod analytics;
mod machine;
mod simulator;
mod types;

pub use analytics::{SplitAccumulator, SplitMetrics};
pub use machine::TradeStateMachine;
pub use simulator::{validate_snapshots, BacktestSimulator};
pub use types::{EventSummary, SimulationError};
