//! Backtest simulator engine

use super::{EventSummary, SimulationError, TradeStateMachine};
use crate::align::AlignedSnapshot;
use crate::config::{self, CostConfig, StrategyConfig};
use crate::execution::CostModel;
use crate::risk::RiskNeutralSizer;
use crate::signal::ParameterCombination;
use chrono::Duration;
use rust_decimal::Decimal;

/// Runs one parameter combination over one event's snapshots
#[derive(Debug, Clone)]
pub struct BacktestSimulator {
    sizer: RiskNeutralSizer,
    min_hold: Duration,
    costs: CostModel,
}

impl BacktestSimulator {
    pub fn new(stake: Decimal, min_hold_seconds: u64, costs: CostModel) -> Self {
        Self {
            sizer: RiskNeutralSizer::new(stake),
            min_hold: config::window(min_hold_seconds),
            costs,
        }
    }

    /// Create from strategy and cost settings
    pub fn from_config(strategy: &StrategyConfig, costs: &CostConfig) -> Self {
        Self::new(
            strategy.stake,
            strategy.min_hold_seconds,
            CostModel::from_config(costs),
        )
    }

    pub fn stake(&self) -> Decimal {
        self.sizer.stake()
    }

    /// Simulate one event. Pure: the same snapshots and parameters always
    /// produce the same summary.
    pub fn run(
        &self,
        snapshots: &[AlignedSnapshot],
        params: ParameterCombination,
    ) -> Result<EventSummary, SimulationError> {
        validate_snapshots(snapshots)?;
        let event_id = &snapshots[0].event_id;

        let mut machine = TradeStateMachine::new(
            event_id.as_str(),
            params,
            self.sizer,
            self.costs.clone(),
            self.min_hold,
        );
        let last = snapshots.len() - 1;
        for (i, snapshot) in snapshots.iter().enumerate() {
            machine.on_snapshot(snapshot, i == last);
        }

        let (trades, skipped_entries) = machine.finish();
        Ok(EventSummary::from_trades(event_id, trades, skipped_entries))
    }
}

fn check_unit(
    snapshot: &AlignedSnapshot,
    field: &'static str,
    value: Option<Decimal>,
) -> Result<(), SimulationError> {
    match value {
        Some(v) if v < Decimal::ZERO || v > Decimal::ONE => Err(SimulationError::OutOfRange {
            event_id: snapshot.event_id.clone(),
            timestamp: snapshot.timestamp,
            field,
            value: v,
        }),
        _ => Ok(()),
    }
}

/// Reject sequences the aligner could never have produced
pub fn validate_snapshots(snapshots: &[AlignedSnapshot]) -> Result<(), SimulationError> {
    let first = snapshots.first().ok_or(SimulationError::Empty)?;

    let mut previous: Option<&AlignedSnapshot> = None;
    for snapshot in snapshots {
        if snapshot.event_id != first.event_id {
            return Err(SimulationError::MixedEvents {
                expected: first.event_id.clone(),
                found: snapshot.event_id.clone(),
            });
        }
        if let Some(prev) = previous {
            if snapshot.timestamp <= prev.timestamp {
                return Err(SimulationError::NonIncreasingTimestamp {
                    event_id: snapshot.event_id.clone(),
                    timestamp: snapshot.timestamp,
                });
            }
        }

        check_unit(snapshot, "model_probability", Some(snapshot.model_probability))?;
        check_unit(snapshot, "market_price", Some(snapshot.market_price))?;
        check_unit(snapshot, "market_bid", snapshot.market_bid)?;
        check_unit(snapshot, "market_ask", snapshot.market_ask)?;
        if let (Some(bid), Some(ask)) = (snapshot.market_bid, snapshot.market_ask) {
            if bid > ask {
                return Err(SimulationError::CrossedQuote {
                    event_id: snapshot.event_id.clone(),
                    timestamp: snapshot.timestamp,
                });
            }
        }

        previous = Some(snapshot);
    }

    Ok(())
}
