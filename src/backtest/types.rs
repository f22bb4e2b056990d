//! Simulation output and error types

use crate::risk::ClosedTrade;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of simulating one event under one parameter combination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub event_id: String,
    pub trades: Vec<ClosedTrade>,
    pub trade_count: usize,
    pub wins: usize,
    pub gross_profit: Decimal,
    pub fees: Decimal,
    pub slippage: Decimal,
    pub net_profit: Decimal,
    pub forced_closes: usize,
    /// Entry signals that could not execute (no quote or unsizeable price)
    pub skipped_entries: usize,
}

impl EventSummary {
    /// Roll closed trades into summary statistics
    pub fn from_trades(event_id: &str, trades: Vec<ClosedTrade>, skipped_entries: usize) -> Self {
        let mut summary = Self {
            event_id: event_id.to_string(),
            trade_count: trades.len(),
            skipped_entries,
            ..Default::default()
        };

        for trade in &trades {
            if trade.is_win() {
                summary.wins += 1;
            }
            if trade.forced_close {
                summary.forced_closes += 1;
            }
            summary.gross_profit += trade.gross_profit;
            summary.fees += trade.fees;
            summary.slippage += trade.slippage;
            summary.net_profit += trade.net_profit;
        }

        summary.trades = trades;
        summary
    }
}

/// Snapshot sequences the simulator refuses to run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("no snapshots to simulate")]
    Empty,
    #[error("snapshot for event {found} in sequence of event {expected}")]
    MixedEvents { expected: String, found: String },
    #[error("event {event_id}: simulation panicked: {message}")]
    Panicked { event_id: String, message: String },
    #[error("event {event_id}: timestamp {timestamp} does not increase")]
    NonIncreasingTimestamp {
        event_id: String,
        timestamp: DateTime<Utc>,
    },
    #[error("event {event_id}: {field} {value} at {timestamp} is outside [0, 1]")]
    OutOfRange {
        event_id: String,
        timestamp: DateTime<Utc>,
        field: &'static str,
        value: Decimal,
    },
    #[error("event {event_id}: crossed quote at {timestamp}")]
    CrossedQuote {
        event_id: String,
        timestamp: DateTime<Utc>,
    },
}
