//! Single-position trade state machine
//!
//! Walks one event's snapshots in order. A flat machine may enter on a
//! widening divergence; an open machine exits once the exit latch is armed
//! and the minimum hold has elapsed. Whatever is still open at the last
//! snapshot is liquidated with a forced-close penalty.

use crate::align::AlignedSnapshot;
use crate::execution::{CostModel, ExecutionQuality};
use crate::risk::{ClosedTrade, OpenPosition, PositionState, RiskNeutralSizer};
use crate::signal::{DivergenceDetector, ExitHysteresis, ParameterCombination, Side};
use crate::telemetry::{self, CounterMetric};
use chrono::Duration;
use rust_decimal::Decimal;

/// Per-event trading state
#[derive(Debug)]
pub struct TradeStateMachine {
    event_id: String,
    detector: DivergenceDetector,
    sizer: RiskNeutralSizer,
    costs: CostModel,
    min_hold: Duration,
    state: PositionState,
    latch: Option<ExitHysteresis>,
    previous_divergence: Option<Decimal>,
    trades: Vec<ClosedTrade>,
    skipped_entries: usize,
}

impl TradeStateMachine {
    pub fn new(
        event_id: impl Into<String>,
        params: ParameterCombination,
        sizer: RiskNeutralSizer,
        costs: CostModel,
        min_hold: Duration,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            detector: DivergenceDetector::new(params),
            sizer,
            costs,
            min_hold,
            state: PositionState::Flat,
            latch: None,
            previous_divergence: None,
            trades: Vec::new(),
            skipped_entries: 0,
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    /// Process the next snapshot. `is_final` marks the event's last
    /// snapshot, which may close but never open a position.
    pub fn on_snapshot(&mut self, snapshot: &AlignedSnapshot, is_final: bool) {
        let divergence = snapshot.divergence();

        match std::mem::take(&mut self.state) {
            PositionState::Flat => {
                if !is_final {
                    if let Some(side) = self.detector.entry_side(self.previous_divergence, divergence) {
                        self.enter(side, snapshot, divergence);
                    }
                }
            }
            PositionState::Open(position) => {
                let armed = self
                    .latch
                    .as_mut()
                    .map(|latch| latch.observe(divergence))
                    .unwrap_or(false);
                let held = snapshot.timestamp - position.entry_timestamp;

                if armed && held >= self.min_hold {
                    self.close(position, snapshot, false);
                } else if is_final {
                    self.close(position, snapshot, true);
                } else {
                    self.state = PositionState::Open(position);
                }
            }
        }

        self.previous_divergence = Some(divergence);
    }

    /// Trades closed so far and the number of skipped entries
    pub fn finish(self) -> (Vec<ClosedTrade>, usize) {
        (self.trades, self.skipped_entries)
    }

    fn enter(&mut self, side: Side, snapshot: &AlignedSnapshot, divergence: Decimal) {
        let quote = match side {
            Side::LongHome => snapshot.market_ask,
            Side::ShortHome => snapshot.market_bid,
        };
        let Some(entry_price) = quote else {
            self.skip_entry(side, snapshot, "no quote on the entry side");
            return;
        };
        let Some(contracts) = self.sizer.contracts(side, entry_price) else {
            self.skip_entry(side, snapshot, "entry price cannot be sized");
            return;
        };

        tracing::trace!(
            event_id = %self.event_id,
            side = side.as_str(),
            %entry_price,
            %contracts,
            %divergence,
            "Entering position"
        );

        self.latch = Some(self.detector.exit_latch(divergence));
        self.state = PositionState::Open(OpenPosition {
            side,
            entry_price,
            entry_timestamp: snapshot.timestamp,
            entry_bid: snapshot.market_bid,
            entry_ask: snapshot.market_ask,
            contracts,
            entry_fee: self.costs.fee(entry_price, self.sizer.stake()),
        });
    }

    fn skip_entry(&mut self, side: Side, snapshot: &AlignedSnapshot, reason: &'static str) {
        self.skipped_entries += 1;
        telemetry::increment(CounterMetric::EntriesSkipped, 1);
        tracing::trace!(
            event_id = %self.event_id,
            side = side.as_str(),
            timestamp = %snapshot.timestamp,
            reason,
            "Entry skipped"
        );
    }

    fn close(&mut self, position: OpenPosition, snapshot: &AlignedSnapshot, forced: bool) {
        let quote = match position.side {
            Side::LongHome => snapshot.market_bid,
            Side::ShortHome => snapshot.market_ask,
        };
        let (exit_price, quality) = match quote {
            Some(price) => (price, ExecutionQuality::Quoted),
            None => (snapshot.market_price, ExecutionQuality::Fallback),
        };

        let exit_costs = self.costs.exit_costs(
            position.side,
            exit_price,
            position.contracts,
            self.sizer.stake(),
            quality,
            forced,
        );
        let trade = ClosedTrade::settle(
            &self.event_id,
            position,
            exit_price,
            snapshot.timestamp,
            exit_costs,
            quality,
            forced,
        );

        tracing::trace!(
            event_id = %self.event_id,
            side = trade.side.as_str(),
            net_profit = %trade.net_profit,
            forced,
            quality = quality.as_str(),
            "Position closed"
        );

        telemetry::increment(CounterMetric::TradesClosed, 1);
        self.latch = None;
        self.state = PositionState::Flat;
        self.trades.push(trade);
    }
}
