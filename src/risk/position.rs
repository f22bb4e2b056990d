//! Position state and closed trades

use crate::execution::{ExecutionQuality, ExitCosts};
use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An open position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub side: Side,
    /// Execution price (ask for longs, bid for shorts)
    pub entry_price: Decimal,
    pub entry_timestamp: DateTime<Utc>,
    pub entry_bid: Option<Decimal>,
    pub entry_ask: Option<Decimal>,
    pub contracts: Decimal,
    pub entry_fee: Decimal,
}

/// Position state of one event. There is never more than one open position.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Open(OpenPosition),
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            PositionState::Flat => None,
            PositionState::Open(position) => Some(position.side),
        }
    }
}

/// A closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub event_id: String,
    pub side: Side,
    pub contracts: Decimal,
    pub entry_price: Decimal,
    /// Price the exit executed at, before any slippage penalty
    pub exit_price: Decimal,
    pub entry_timestamp: DateTime<Utc>,
    pub exit_timestamp: DateTime<Utc>,
    pub gross_profit: Decimal,
    /// Entry plus exit fees
    pub fees: Decimal,
    pub slippage: Decimal,
    pub net_profit: Decimal,
    pub exit_quality: ExecutionQuality,
    pub forced_close: bool,
}

/// Price-based P&L. The event's real-world outcome plays no part.
pub fn gross_profit(side: Side, entry_price: Decimal, exit_price: Decimal, contracts: Decimal) -> Decimal {
    match side {
        Side::LongHome => (exit_price - entry_price) * contracts,
        Side::ShortHome => (entry_price - exit_price) * contracts,
    }
}

impl ClosedTrade {
    /// Settle an open position at `exit_price`
    pub fn settle(
        event_id: &str,
        position: OpenPosition,
        exit_price: Decimal,
        exit_timestamp: DateTime<Utc>,
        exit_costs: ExitCosts,
        exit_quality: ExecutionQuality,
        forced_close: bool,
    ) -> Self {
        let gross = gross_profit(
            position.side,
            position.entry_price,
            exit_price,
            position.contracts,
        );
        let fees = position.entry_fee + exit_costs.fee;

        Self {
            event_id: event_id.to_string(),
            side: position.side,
            contracts: position.contracts,
            entry_price: position.entry_price,
            exit_price,
            entry_timestamp: position.entry_timestamp,
            exit_timestamp,
            gross_profit: gross,
            fees,
            slippage: exit_costs.slippage,
            net_profit: gross - fees - exit_costs.slippage,
            exit_quality,
            forced_close,
        }
    }

    pub fn is_win(&self) -> bool {
        self.net_profit > Decimal::ZERO
    }

    /// Seconds between entry and exit
    pub fn hold_seconds(&self) -> i64 {
        (self.exit_timestamp - self.entry_timestamp).num_seconds()
    }
}
