//! Backtest analytics and reporting

use super::EventSummary;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Aggregate statistics over a set of events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    /// Events simulated successfully
    pub events_evaluated: usize,
    /// Events excluded from the aggregate (failed or never aligned)
    pub events_omitted: usize,
    /// Total number of trades
    pub trade_count: usize,
    pub wins: usize,
    /// Winning trades over all trades, 0 when there were none
    pub win_rate: Decimal,
    pub gross_profit: Decimal,
    pub fees: Decimal,
    pub slippage: Decimal,
    /// Net P&L after fees and slippage
    pub net_profit: Decimal,
    pub forced_closes: usize,
    pub avg_net_per_trade: Decimal,
    /// Largest peak-to-trough fall of cumulative net profit, event by event
    pub max_drawdown: Decimal,
}

impl SplitMetrics {
    pub fn has_trades(&self) -> bool {
        self.trade_count > 0
    }

    /// Format as table for CLI output
    pub fn format_table(&self, title: &str) -> String {
        format!(
            r#"
══════════════════════════════════════════════════════
               {}
══════════════════════════════════════════════════════

PERFORMANCE
───────────────────────────────────────────────────────
Net P&L:          {:+.2}
Gross P&L:        {:+.2}
Fees:             {:.2}
Slippage:         {:.2}
Max Drawdown:     {:.2}
Win Rate:         {:.1}%
Avg Net/Trade:    {:+.2}

ACTIVITY
───────────────────────────────────────────────────────
Total Trades:     {}
Forced Closes:    {}
Events:           {} evaluated, {} omitted
══════════════════════════════════════════════════════
"#,
            title,
            self.net_profit,
            self.gross_profit,
            self.fees,
            self.slippage,
            self.max_drawdown,
            self.win_rate * dec!(100),
            self.avg_net_per_trade,
            self.trade_count,
            self.forced_closes,
            self.events_evaluated,
            self.events_omitted,
        )
    }
}

/// Builds [`SplitMetrics`] from event summaries in order
#[derive(Debug, Clone, Default)]
pub struct SplitAccumulator {
    metrics: SplitMetrics,
    cumulative: Decimal,
    peak: Decimal,
}

impl SplitAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, summary: &EventSummary) {
        let m = &mut self.metrics;
        m.events_evaluated += 1;
        m.trade_count += summary.trade_count;
        m.wins += summary.wins;
        m.gross_profit += summary.gross_profit;
        m.fees += summary.fees;
        m.slippage += summary.slippage;
        m.net_profit += summary.net_profit;
        m.forced_closes += summary.forced_closes;

        self.cumulative += summary.net_profit;
        self.peak = self.peak.max(self.cumulative);
        m.max_drawdown = m.max_drawdown.max(self.peak - self.cumulative);
    }

    pub fn record_omitted(&mut self) {
        self.metrics.events_omitted += 1;
    }

    pub fn finish(self) -> SplitMetrics {
        let mut metrics = self.metrics;
        if metrics.trade_count > 0 {
            let trades = Decimal::from(metrics.trade_count);
            metrics.win_rate = Decimal::from(metrics.wins) / trades;
            metrics.avg_net_per_trade = metrics.net_profit / trades;
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(net: Decimal, trades: usize, wins: usize) -> EventSummary {
        EventSummary {
            event_id: "evt".to_string(),
            trade_count: trades,
            wins,
            gross_profit: net + dec!(1),
            fees: dec!(1),
            net_profit: net,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_accumulator() {
        let metrics = SplitAccumulator::new().finish();
        assert_eq!(metrics, SplitMetrics::default());
        assert!(!metrics.has_trades());
    }

    #[test]
    fn test_aggregates_and_rates() {
        let mut acc = SplitAccumulator::new();
        acc.record(&summary(dec!(10), 2, 1));
        acc.record(&summary(dec!(-4), 2, 2));
        acc.record_omitted();
        let m = acc.finish();

        assert_eq!(m.events_evaluated, 2);
        assert_eq!(m.events_omitted, 1);
        assert_eq!(m.trade_count, 4);
        assert_eq!(m.net_profit, dec!(6));
        assert_eq!(m.gross_profit, dec!(8));
        assert_eq!(m.fees, dec!(2));
        assert_eq!(m.win_rate, dec!(0.75));
        assert_eq!(m.avg_net_per_trade, dec!(1.5));
    }

    #[test]
    fn test_max_drawdown() {
        let mut acc = SplitAccumulator::new();
        for net in [dec!(5), dec!(-3), dec!(2), dec!(-6), dec!(10)] {
            acc.record(&summary(net, 1, 0));
        }
        // Peak 5, trough -2
        assert_eq!(acc.finish().max_drawdown, dec!(7));
    }

    #[test]
    fn test_drawdown_from_start() {
        let mut acc = SplitAccumulator::new();
        acc.record(&summary(dec!(-3), 1, 0));
        assert_eq!(acc.finish().max_drawdown, dec!(3));
    }

    #[test]
    fn test_format_table() {
        let mut acc = SplitAccumulator::new();
        acc.record(&summary(dec!(10), 2, 1));
        let table = acc.finish().format_table("TEST SPLIT");
        assert!(table.contains("TEST SPLIT"));
        assert!(table.contains("Total Trades:     2"));
    }
}
