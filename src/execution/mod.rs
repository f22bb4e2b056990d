//! Execution module
//!
//! Fee and slippage accounting for simulated fills

mod cost;

pub use cost::{CostModel, ExecutionQuality, ExitCosts, PRICE_UNIT};
