//! Risk management module
//!
//! Position state, risk-neutral sizing, and trade settlement

mod position;
mod sizing;

pub use position::{gross_profit, ClosedTrade, OpenPosition, PositionState};
pub use sizing::{max_loss, worst_case_loss_per_contract, RiskNeutralSizer};
